use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::{
    app::AppContext,
    config_editor::{ConfigEdit, HOLD_DURATION},
    models::ConfigKind,
    place_bet::{self, BetSelection, PlaceBetError, PlaceBetForm, SelectionSummary},
    utils::now_ts,
};

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/notifications", get(api_notifications))
        .route("/api/refresh", post(api_refresh))
        .route("/api/status", get(api_status))
        .route("/api/health", get(api_health))
        .route("/api/config/sports", get(api_config_sports))
        .route("/api/config/{kind}/{id}", patch(api_config_edit))
        .route("/api/config/{kind}/{id}/select", post(api_config_select))
        .route(
            "/api/config/{kind}/{id}/trigger_time/toggle",
            post(api_trigger_toggle),
        )
        .route("/api/config/{kind}/{id}/trigger_time/hold", post(api_hold_begin))
        .route("/api/holds/{session}", delete(api_hold_end))
        .route("/api/options", get(api_options))
        .route("/api/options/{id}", patch(api_option_update))
        .route("/api/bet_selection", get(api_bet_selection).post(api_save_bet_selection))
        .route("/api/place_bet/preview", post(api_place_bet_preview))
        .route("/api/place_bet/confirm", post(api_place_bet_confirm))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

pub async fn serve_dashboard(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.settings.dashboard_host, ctx.settings.dashboard_port)
        .parse()
        .context("dashboard addr parse")?;
    let app = router(ctx);

    log::info!("dashboard.start url=http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_json(status: StatusCode, e: &anyhow::Error) -> Response {
    (status, Json(serde_json::json!({"ok": false, "error": format!("{e:#}")}))).into_response()
}

fn dialog(status: StatusCode, e: &PlaceBetError) -> Response {
    (
        status,
        Json(serde_json::json!({"ok": false, "title": e.title(), "text": e.text()})),
    )
        .into_response()
}

fn parse_kind(raw: &str) -> Result<ConfigKind, Response> {
    ConfigKind::from_collection(raw).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"ok": false, "error": format!("unknown config kind {raw}")})),
        )
            .into_response()
    })
}

async fn index(State(ctx): State<AppContext>) -> impl IntoResponse {
    Html(render_index_html(
        ctx.backend.base_url(),
        &ctx.settings.dashboard_host,
        ctx.settings.dashboard_port,
        ctx.store.path(),
    ))
}

#[derive(Deserialize)]
struct SinceQ {
    since: Option<u64>,
}

async fn api_notifications(State(ctx): State<AppContext>, Query(q): Query<SinceQ>) -> impl IntoResponse {
    let manager = ctx.poller.manager().lock();
    let surface = manager.surface();
    Json(serde_json::json!({
        "ts": now_ts(),
        "live": manager.len(),
        "tracked": manager.tracked_len(),
        "fading": surface.node_count().saturating_sub(manager.len()),
        "in_flight": ctx.poller.gate().in_flight(),
        "nodes": surface.snapshot(),
        // Without `since` the caller has heard nothing yet; it starts from `last_cue`.
        "sound_cues": q.since.map(|seq| surface.sound_cues_since(seq)).unwrap_or_default(),
        "last_cue": surface.last_cue(),
        "poll_seq": ctx.poller.gate().latest_seq(),
    }))
}

async fn api_refresh(State(ctx): State<AppContext>) -> impl IntoResponse {
    let seq = ctx.poller.refresh();
    log::info!("notifications.refresh seq={}", seq);
    Json(serde_json::json!({"ok": true, "seq": seq}))
}

async fn api_status(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(serde_json::json!({"ts": now_ts(), "status": ctx.status.latest()}))
}

async fn api_health(State(ctx): State<AppContext>) -> impl IntoResponse {
    let health = ctx
        .store
        .fetch_runtime_statuses()
        .unwrap_or_else(|_| serde_json::json!({}));
    Json(serde_json::json!({ "ts": now_ts(), "components": health }))
}

#[derive(Deserialize)]
struct ReloadQ {
    reload: Option<i32>,
}

async fn api_config_sports(State(ctx): State<AppContext>, Query(q): Query<ReloadQ>) -> Response {
    let mut nav = ctx.config.lock().await;
    if q.reload.unwrap_or(0) == 1 {
        if let Err(e) = nav.load_sports(&ctx.backend).await {
            return error_json(StatusCode::BAD_GATEWAY, &e);
        }
    }
    Json(nav.view()).into_response()
}

async fn api_config_select(
    State(ctx): State<AppContext>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(r) => return r,
    };
    let mut nav = ctx.config.lock().await;
    let res = match kind {
        ConfigKind::Sport => nav.select_sport(&ctx.backend, &id).await,
        ConfigKind::Market => nav.select_market(&ctx.backend, &id).await,
        ConfigKind::Bet => {
            return error_json(
                StatusCode::BAD_REQUEST,
                &anyhow::anyhow!("bets have no children"),
            )
        }
    };
    match res {
        Ok(_) => Json(nav.view()).into_response(),
        Err(e) => error_json(StatusCode::BAD_GATEWAY, &e),
    }
}

async fn edit_item(ctx: &AppContext, kind: &str, id: &str, edit: ConfigEdit) -> Response {
    let kind = match parse_kind(kind) {
        Ok(k) => k,
        Err(r) => return r,
    };
    let mut nav = ctx.config.lock().await;
    match nav.edit(&ctx.backend, kind, id, edit).await {
        Ok(row) => Json(serde_json::json!({"ok": true, "item": row})).into_response(),
        Err(e) => error_json(StatusCode::BAD_GATEWAY, &e),
    }
}

async fn api_config_edit(
    State(ctx): State<AppContext>,
    Path((kind, id)): Path<(String, String)>,
    Json(edit): Json<ConfigEdit>,
) -> Response {
    edit_item(&ctx, &kind, &id, edit).await
}

async fn api_trigger_toggle(
    State(ctx): State<AppContext>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    edit_item(&ctx, &kind, &id, ConfigEdit::ToggleTriggerTime).await
}

async fn api_hold_begin(
    State(ctx): State<AppContext>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(r) => return r,
    };
    let config = ctx.config.clone();
    let backend = ctx.backend.clone();
    let session = ctx.holds.begin(HOLD_DURATION, async move {
        let mut nav = config.lock().await;
        if let Err(e) = nav.edit(&backend, kind, &id, ConfigEdit::ToggleTriggerTime).await {
            log::warn!("config.hold.toggle_failed err={:#}", e);
        }
    });
    log::debug!("config.hold.begin session={} open={}", session, ctx.holds.open());
    Json(serde_json::json!({"ok": true, "session": session})).into_response()
}

async fn api_hold_end(State(ctx): State<AppContext>, Path(session): Path<Uuid>) -> impl IntoResponse {
    let cancelled = ctx.holds.end(session);
    Json(serde_json::json!({"ok": true, "cancelled": cancelled}))
}

async fn api_options(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.options.entries())
}

#[derive(Deserialize)]
struct OptionPatch {
    value: JsonValue,
}

async fn api_option_update(
    State(ctx): State<AppContext>,
    Path(id): Path<u32>,
    Json(body): Json<OptionPatch>,
) -> Response {
    let raw = match body.value {
        JsonValue::String(s) => s,
        JsonValue::Number(n) => n.to_string(),
        other => {
            return error_json(
                StatusCode::BAD_REQUEST,
                &anyhow::anyhow!("option value must be a number, got {other}"),
            )
        }
    };
    match ctx.options.update(id, &raw).await {
        Ok(entry) => Json(serde_json::json!({"ok": true, "option": entry})).into_response(),
        Err(e) => error_json(StatusCode::BAD_GATEWAY, &e),
    }
}

async fn api_bet_selection(State(ctx): State<AppContext>) -> Response {
    match ctx.bet_selection.load() {
        Ok(sel) => Json(serde_json::json!({
            "selection": sel,
            "summary": SelectionSummary::of(sel.as_ref()),
        }))
        .into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

async fn api_save_bet_selection(
    State(ctx): State<AppContext>,
    Json(sel): Json<BetSelection>,
) -> Response {
    match ctx.bet_selection.save(&sel) {
        Ok(()) => Json(serde_json::json!({"ok": true})).into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

fn prepare_form(ctx: &AppContext, form: &PlaceBetForm) -> Result<place_bet::BetTicket, Response> {
    let saved = ctx
        .bet_selection
        .load()
        .map_err(|e| error_json(StatusCode::INTERNAL_SERVER_ERROR, &e))?;
    place_bet::prepare(form, saved.as_ref()).map_err(|e| dialog(StatusCode::UNPROCESSABLE_ENTITY, &e))
}

async fn api_place_bet_preview(
    State(ctx): State<AppContext>,
    Json(form): Json<PlaceBetForm>,
) -> Response {
    match prepare_form(&ctx, &form) {
        Ok(ticket) => Json(serde_json::json!({
            "ok": true,
            "title": "Bet summary",
            "text": ticket.summary,
        }))
        .into_response(),
        Err(r) => r,
    }
}

async fn api_place_bet_confirm(
    State(ctx): State<AppContext>,
    Json(form): Json<PlaceBetForm>,
) -> Response {
    let ticket = match prepare_form(&ctx, &form) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match place_bet::place(&ctx.backend, &ticket).await {
        Ok(text) => Json(serde_json::json!({"ok": true, "title": "Bet results", "text": text})).into_response(),
        Err(e) => dialog(StatusCode::BAD_GATEWAY, &e),
    }
}

fn render_index_html(backend: &str, host: &str, port: u16, sqlite_path: &str) -> String {
    // Single-file UI, no build step.
    format!(
        r#"<!doctype html>
 <html lang="en">
   <head>
     <meta charset="utf-8" />
     <meta name="viewport" content="width=device-width, initial-scale=1" />
     <title>CWS • Dashboard</title>
     <style>
       :root {{
         --bg: #0b1220;
         --panel: rgba(255,255,255,0.06);
         --stroke: rgba(255,255,255,0.12);
         --text: rgba(255,255,255,0.92);
         --muted: rgba(255,255,255,0.65);
         --good: #33d17a;
         --bad: #ff4d4d;
         --warn: #ffcc00;
         --brand: #7c5cff;
         --brand2: #3dd6d0;
       }}
       * {{ box-sizing: border-box; }}
       body {{
         margin: 0;
         font-family: ui-sans-serif, system-ui, -apple-system, Segoe UI, Roboto, Helvetica, Arial;
         color: var(--text);
         background: radial-gradient(1200px 900px at 15% 10%, rgba(124,92,255,0.20), transparent 60%),
                     radial-gradient(1100px 800px at 90% 20%, rgba(61,214,208,0.16), transparent 55%),
                     var(--bg);
       }}
       .wrap {{ max-width: 1280px; margin: 0 auto; padding: 22px 18px 42px; }}
       .topbar {{
         display: flex; align-items: center; justify-content: space-between; gap: 12px;
         padding: 16px; border: 1px solid var(--stroke); border-radius: 16px;
         background: linear-gradient(180deg, rgba(255,255,255,0.06), rgba(255,255,255,0.03));
       }}
       .title {{ font-weight: 800; }}
       .subtitle {{ color: var(--muted); font-size: 12px; margin-top: 2px; }}
       .chips {{ display: flex; flex-wrap: wrap; gap: 8px; justify-content: flex-end; }}
       .chip {{
         padding: 7px 10px; border-radius: 999px; border: 1px solid var(--stroke);
         background: rgba(255,255,255,0.04); font-size: 12px; color: var(--muted); white-space: nowrap;
       }}
       .chip b {{ color: var(--text); }}
       .grid {{ display: grid; gap: 14px; margin-top: 14px; grid-template-columns: repeat(12, 1fr); }}
       .card {{ border: 1px solid var(--stroke); border-radius: 16px; background: var(--panel); overflow: hidden; }}
       .card .hd {{
         display:flex; align-items: center; justify-content: space-between; gap: 10px;
         padding: 12px 14px; border-bottom: 1px solid rgba(255,255,255,0.08); font-weight: 800;
       }}
       .card .bd {{ padding: 12px 14px; }}
       .good {{ color: var(--good); }}
       .bad {{ color: var(--bad); }}
       .warn {{ color: var(--warn); }}
       .small {{ font-size: 12px; color: var(--muted); }}
       .mono {{ font-family: ui-monospace, SFMono-Regular, Menlo, Monaco, Consolas, monospace; }}
       .btn {{
         cursor: pointer; padding: 8px 10px; border-radius: 10px; border: 1px solid rgba(255,255,255,0.12);
         background: rgba(255,255,255,0.05); color: var(--text); font-weight: 700; font-size: 12px;
       }}
       .btn:hover {{ background: rgba(255,255,255,0.08); }}
       input, textarea {{
         background: rgba(255,255,255,0.05); color: var(--text); border: 1px solid var(--stroke);
         border-radius: 8px; padding: 6px 8px;
       }}
       input[readonly] {{ opacity: 0.45; }}
       .notification {{
         border: 1px solid rgba(255,255,255,0.10); border-radius: 12px; padding: 10px 12px; margin-bottom: 8px;
         transition: background 0.6s, opacity 3s;
       }}
       .notification.uptime-short {{ border-left: 4px solid var(--good); }}
       .notification.uptime-medium {{ border-left: 4px solid var(--warn); }}
       .notification.uptime-long {{ border-left: 4px solid var(--bad); }}
       .notification.added {{ background: rgba(51,209,122,0.12); }}
       .notification.updated .score {{ color: var(--warn); }}
       .notification.removed {{ opacity: 0.25; }}
       .notification .tip {{ cursor: pointer; margin-right: 10px; }}
       .notification .tip:hover {{ text-decoration: underline; }}
       .cfg {{ display:flex; align-items:center; gap: 8px; padding: 4px 0; }}
       .cfg.active {{ font-weight: 800; }}
       .cfg .name {{ flex: 1; cursor: pointer; }}
       .cfg input[type=number] {{ width: 70px; }}
       .opt {{ display:flex; justify-content: space-between; gap: 8px; padding: 4px 0; }}
       .opt input {{ width: 90px; }}
       .banner {{
         margin-top: 12px; padding: 10px 12px; border-radius: 14px;
         border: 1px solid rgba(255,255,255,0.14); background: rgba(255, 77, 77, 0.10); display: none;
       }}
       .banner pre {{ margin: 8px 0 0; white-space: pre-wrap; }}
       .col-12 {{ grid-column: span 12; }}
       .col-8 {{ grid-column: span 8; }}
       .col-4 {{ grid-column: span 4; }}
       @media (max-width: 1100px) {{
         .col-8, .col-4 {{ grid-column: span 12; }}
       }}
     </style>
   </head>
   <body>
     <div class="wrap">
       <div class="topbar">
         <div>
           <div class="title">CWS • Dashboard</div>
           <div class="subtitle">Local: <span class="mono">{host}:{port}</span> • backend <span class="mono">{backend}</span></div>
         </div>
         <div class="chips">
           <div class="chip">Events: <b id="stEvents">--</b></div>
           <div class="chip">Notifications: <b id="stNotifications">--</b></div>
           <div class="chip">Heavy load: <b id="stHeavy">--</b></div>
           <div class="chip">Error: <b id="stError">--</b></div>
           <div class="chip">Checked: <b id="stChecked">--</b></div>
           <button class="btn" id="refreshBtn">Refresh</button>
         </div>
       </div>

       <div class="banner" id="errBanner">
         <div style="font-weight:850;" id="errBannerMsg">--</div>
         <pre class="mono small" id="errBannerDetail"></pre>
       </div>

       <div class="grid">
         <div class="card col-8">
           <div class="hd">Live notifications <span class="small" id="liveMeta">--</span></div>
           <div class="bd" id="notifications"></div>
         </div>

         <div class="card col-4">
           <div class="hd">Options</div>
           <div class="bd" id="options"></div>
         </div>

         <div class="card col-4">
           <div class="hd">Sports</div>
           <div class="bd" id="cfgSports"></div>
         </div>
         <div class="card col-4">
           <div class="hd">Markets</div>
           <div class="bd" id="cfgMarkets"></div>
         </div>
         <div class="card col-4">
           <div class="hd">Bets</div>
           <div class="bd" id="cfgBets"></div>
         </div>

         <div class="card col-12">
           <div class="hd">Place bet</div>
           <div class="bd">
             <div class="small">Bots, one per line as <span class="mono">id name</span></div>
             <textarea id="pbBots" rows="3" style="width:100%"></textarea>
             <div style="margin-top:8px;">
               <label><input type="radio" name="details-provider" value="auto" checked /> Last clicked tip</label>
               <span class="small" id="pbAuto">--</span>
             </div>
             <div>
               <label><input type="radio" name="details-provider" value="manual" /> Manual</label>
               <input id="pbSelection" placeholder="Selection ID" />
               <input id="pbOdds" placeholder="Odds" />
             </div>
             <div style="margin-top:8px;">
               <input id="pbStake" placeholder="Stake" />
               <button class="btn" id="pbBtn">Place bet</button>
             </div>
           </div>
         </div>
       </div>
       <div class="small" style="margin-top:14px;">SQLite: <span class="mono">{sqlite_path}</span></div>
     </div>

     <script>
       let lastCue = null;
       const holds = new Map();
       const cards = new Map();

       async function getJson(path) {{
         const r = await fetch(path, {{ cache: "no-store" }});
         if (!r.ok) throw new Error(`${{path}} -> ${{r.status}}`);
         return await r.json();
       }}
       async function sendJson(method, path, body) {{
         const r = await fetch(path, {{
           method,
           headers: {{ "content-type": "application/json" }},
           body: body === undefined ? undefined : JSON.stringify(body),
         }});
         const data = await r.json().catch(() => ({{}}));
         if (!r.ok) {{
           const e = new Error(data.error || data.text || `${{path}} -> ${{r.status}}`);
           e.data = data;
           throw e;
         }}
         return data;
       }}
       function showBanner(msg, detail) {{
         document.getElementById("errBannerMsg").textContent = msg || "--";
         document.getElementById("errBannerDetail").textContent = detail || "";
         document.getElementById("errBanner").style.display = "block";
       }}
       function hideBanner() {{ document.getElementById("errBanner").style.display = "none"; }}
       function escapeHtml(s) {{
         return (s||"").toString().replaceAll("&","&amp;").replaceAll("<","&lt;").replaceAll(">","&gt;").replaceAll('"',"&quot;").replaceAll("'","&#039;");
       }}

       function beep() {{
         try {{
           const ctx = new (window.AudioContext || window.webkitAudioContext)();
           const o = ctx.createOscillator();
           o.frequency.value = 880;
           o.connect(ctx.destination);
           o.start();
           o.stop(ctx.currentTime + 0.25);
         }} catch (e) {{}}
       }}

       async function pickTip(node, tip) {{
         await sendJson("POST", "/api/bet_selection", {{
           eventName: node.title, betName: node.bet, tipName: tip.name, odds: tip.odds, selectionId: tip.selection_id,
         }});
         refreshSelection();
       }}

       function buildCard(n) {{
         const el = document.createElement("div");
         el.innerHTML = `
           <div><b class="sport"></b> <a class="title" target="_blank"></a></div>
           <div class="small bet"></div>
           <div class="tips"></div>
           <div class="small">⏱ <span class="uptime"></span> • <span class="match-time"></span> • <span class="score"></span></div>`;
         el.querySelector(".sport").textContent = n.sport;
         const a = el.querySelector(".title");
         a.textContent = n.title;
         a.href = n.href;
         el.querySelector(".bet").textContent = n.bet;
         const tips = el.querySelector(".tips");
         for (const t of n.tips) {{
           const s = document.createElement("span");
           s.className = "tip";
           s.textContent = t.label;
           s.addEventListener("click", () => pickTip(n, t).catch((e) => showBanner("Saving tip failed", e.message)));
           tips.appendChild(s);
         }}
         return el;
       }}
       function setText(el, sel, text) {{
         const t = el.querySelector(sel);
         if (t.textContent !== text) t.textContent = text;
       }}

       function renderNotifications(data) {{
         const root = document.getElementById("notifications");
         const seen = new Set();
         let prev = null;
         for (const n of data.nodes) {{
           const key = String(n.key);
           seen.add(key);
           let el = cards.get(key);
           if (!el) {{
             el = buildCard(n);
             cards.set(key, el);
           }}
           const cls = ["notification", ...n.classes].join(" ");
           if (el.className !== cls) el.className = cls;
           setText(el, ".uptime", n.uptime);
           setText(el, ".match-time", n.match_time);
           setText(el, ".score", n.score);
           const at = prev ? prev.nextSibling : root.firstChild;
           if (at !== el) root.insertBefore(el, at);
           prev = el;
         }}
         for (const [key, el] of cards) {{
           if (!seen.has(key)) {{
             el.remove();
             cards.delete(key);
           }}
         }}
         document.getElementById("liveMeta").textContent = `${{data.live}} live`;
         // First response after a load only sets the baseline; old cues stay silent.
         if (lastCue === null || data.last_cue < lastCue) {{
           lastCue = data.last_cue;
           return;
         }}
         for (const cue of data.sound_cues) {{
           if (cue.seq > lastCue) beep();
         }}
         lastCue = Math.max(lastCue, data.last_cue);
       }}

       function renderStatus(s) {{
         if (!s) return;
         document.getElementById("stEvents").textContent = s.events;
         document.getElementById("stNotifications").textContent = s.notifications;
         document.getElementById("stHeavy").textContent = s.heavy_load;
         const err = document.getElementById("stError");
         err.textContent = s.error;
         err.title = s.error_title || "";
         err.className = s.error === "yes" ? "bad" : "good";
         document.getElementById("stChecked").textContent = s.checked_at;
       }}

       function cfgRow(row, onSelect) {{
         const el = document.createElement("div");
         el.className = "cfg" + (row.active ? " active" : "");
         const base = `/api/config/${{row.kind}}/${{encodeURIComponent(row.id)}}`;
         const box = document.createElement("input");
         box.type = "checkbox";
         box.checked = row.is_enabled;
         box.addEventListener("change", () =>
           sendJson("PATCH", base, {{ edit: "set_enabled", value: box.checked }})
             .catch((e) => {{ box.checked = !box.checked; showBanner("Update failed", e.message); }}));
         el.appendChild(box);
         const name = document.createElement("span");
         name.className = "name";
         name.textContent = row.name;
         if (row.selectable) name.addEventListener("click", onSelect);
         el.appendChild(name);
         if (row.trigger_readonly !== null) {{
           const t = document.createElement("input");
           t.type = "number"; t.min = 10; t.step = 5;
           t.value = row.trigger_time ?? "";
           t.readOnly = row.trigger_readonly;
           t.addEventListener("change", () => {{
             const v = t.value === "" ? null : Number(t.value);
             sendJson("PATCH", base, {{ edit: "set_trigger_time", value: v }}).catch((e) => showBanner("Update failed", e.message));
           }});
           t.addEventListener("click", (e) => {{
             if (!e.ctrlKey) return;
             sendJson("POST", `${{base}}/trigger_time/toggle`)
               .then(loadConfig)
               .catch((err) => showBanner("Update failed", err.message));
           }});
           t.addEventListener("touchstart", () => {{
             holds.set(t, sendJson("POST", `${{base}}/trigger_time/hold`));
             setTimeout(loadConfig, 1200);
           }});
           const release = async () => {{
             const pending = holds.get(t);
             if (!pending) return;
             holds.delete(t);
             try {{
               const r = await pending;
               await sendJson("DELETE", `/api/holds/${{r.session}}`);
             }} catch (e) {{}}
           }};
           t.addEventListener("touchend", release);
           t.addEventListener("touchcancel", release);
           el.appendChild(t);
         }}
         return el;
       }}

       function renderConfig(view) {{
         const fill = (id, rows, kind) => {{
           const root = document.getElementById(id);
           root.innerHTML = "";
           for (const r of rows) {{
             root.appendChild(cfgRow(r, () =>
               sendJson("POST", `/api/config/${{kind}}/${{encodeURIComponent(r.id)}}/select`).then(renderConfig)
                 .catch((e) => showBanner("Loading failed", e.message))));
           }}
         }};
         fill("cfgSports", view.sports, "sports");
         fill("cfgMarkets", view.markets, "markets");
         fill("cfgBets", view.bets, "bets");
       }}
       async function loadConfig() {{ renderConfig(await getJson("/api/config/sports")); }}

       async function loadOptions() {{
         const root = document.getElementById("options");
         root.innerHTML = "";
         for (const o of await getJson("/api/options")) {{
           const el = document.createElement("div");
           el.className = "opt";
           el.id = o.hook;
           el.innerHTML = `<span>${{escapeHtml(o.name)}}</span>`;
           const inp = document.createElement("input");
           inp.value = o.value;
           inp.addEventListener("change", () =>
             sendJson("PATCH", `/api/options/${{o.id}}`, {{ value: inp.value }})
               .catch((e) => {{ showBanner("Option update failed", e.message); loadOptions(); }}));
           el.appendChild(inp);
           root.appendChild(el);
         }}
       }}

       async function refreshSelection() {{
         const r = await getJson("/api/bet_selection");
         const s = r.summary;
         document.getElementById("pbAuto").textContent = `${{s.event_name}} • ${{s.bet_name}} • ${{s.tip_name}} (${{s.odds}})`;
       }}

       function betForm() {{
         const bots = document.getElementById("pbBots").value.split("\n")
           .map((l) => l.trim()).filter((l) => l.length)
           .map((l) => {{ const [id, ...rest] = l.split(/\s+/); return {{ id: parseInt(id), name: rest.join(" ") || id }}; }});
         const provider = document.querySelector('input[name="details-provider"]:checked').value;
         const details = provider === "auto"
           ? {{ provider: "auto" }}
           : {{ provider: "manual", selection_id: document.getElementById("pbSelection").value, odds: document.getElementById("pbOdds").value }};
         return {{ bots, details, stake: document.getElementById("pbStake").value }};
       }}

       async function placeBet() {{
         const form = betForm();
         try {{
           const preview = await sendJson("POST", "/api/place_bet/preview", form);
           if (!confirm(`${{preview.title}}\n\n${{preview.text}}`)) return;
           const res = await sendJson("POST", "/api/place_bet/confirm", form);
           alert(`${{res.title}}\n\n${{res.text}}`);
         }} catch (e) {{
           const d = e.data || {{}};
           alert(`${{d.title || "Error"}}\n\n${{d.text || e.message}}`);
         }}
       }}

       async function tick() {{
         try {{
           const since = lastCue === null ? "" : `?since=${{lastCue}}`;
           renderNotifications(await getJson(`/api/notifications${{since}}`));
           hideBanner();
         }} catch (e) {{
           showBanner("Dashboard refresh failed", e.message);
         }}
       }}
       async function statusTick() {{
         try {{ renderStatus((await getJson("/api/status")).status); }} catch (e) {{}}
       }}

       document.getElementById("refreshBtn").addEventListener("click", () => sendJson("POST", "/api/refresh").then(tick));
       document.getElementById("pbBtn").addEventListener("click", placeBet);
       tick();
       statusTick();
       loadConfig().catch((e) => showBanner("Loading config failed", e.message));
       loadOptions().catch((e) => showBanner("Loading options failed", e.message));
       refreshSelection().catch(() => {{}});
       setInterval(tick, 500);
       setInterval(statusTick, 5000);
     </script>
   </body>
 </html>"#,
        backend = backend,
        host = host,
        port = port,
        sqlite_path = sqlite_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Settings,
        store::SqliteStore,
        surface::{Mutation, NotificationSurface},
        test_support::serve,
    };
    use serde_json::json;

    fn context(backend_url: &str) -> (tempfile::TempDir, AppContext) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dash.sqlite");
        let store = SqliteStore::new(path.to_str().unwrap()).unwrap();
        store.init_db().unwrap();
        let settings = Settings {
            backend_base_url: backend_url.to_string(),
            http_timeout_ms: 2_000,
            ..Settings::default()
        };
        let (ctx, _rx) = AppContext::new(settings, store).unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn index_and_health_render() {
        let (_dir, ctx) = context("http://127.0.0.1:1");
        ctx.store
            .upsert_runtime_status("status", "ok", "events=1", None, 1.0)
            .unwrap();
        let base = serve(router(ctx)).await;
        let http = reqwest::Client::new();

        let html = http.get(format!("{base}/")).send().await.unwrap().text().await.unwrap();
        assert!(html.contains("Live notifications"));

        let health: JsonValue = http
            .get(format!("{base}/api/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["components"]["status"]["level"], "ok");
    }

    #[tokio::test]
    async fn notifications_endpoint_reflects_surface() {
        let (_dir, ctx) = context("http://127.0.0.1:1");
        ctx.poller
            .manager()
            .lock()
            .reconcile(&[crate::test_support::record("a", 10, "0:0")])
            .unwrap();
        let base = serve(router(ctx)).await;

        let body: JsonValue = reqwest::get(format!("{base}/api/notifications"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["live"], 1);
        assert_eq!(body["nodes"][0]["id"], "a");
        assert_eq!(body["nodes"][0]["score"], "0:0 (0)");
    }

    #[tokio::test]
    async fn trigger_input_gestures_match_the_editor() {
        let (_dir, ctx) = context("http://127.0.0.1:1");
        let base = serve(router(ctx)).await;
        let html = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert!(html.contains("e.ctrlKey"));
        assert!(html.contains(r#"addEventListener("touchcancel", release)"#));
        assert!(html.contains(r#"addEventListener("touchend", release)"#));
        assert!(!html.contains("dblclick"));
        // The pending hold request itself is stored, so an early release can still cancel it.
        assert!(html.contains("holds.set(t, sendJson("));
    }

    #[tokio::test]
    async fn released_hold_is_cancelled_once() {
        let (_dir, ctx) = context("http://127.0.0.1:1");
        let holds = ctx.holds.clone();
        let base = serve(router(ctx)).await;
        let http = reqwest::Client::new();

        let begun: JsonValue = http
            .post(format!("{base}/api/config/sports/4/trigger_time/hold"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let session = begun["session"].as_str().unwrap().to_string();
        assert_eq!(holds.open(), 1);

        let end = |session: String| {
            let http = http.clone();
            let base = base.clone();
            async move {
                http.delete(format!("{base}/api/holds/{session}"))
                    .send()
                    .await
                    .unwrap()
                    .json::<JsonValue>()
                    .await
                    .unwrap()
            }
        };
        assert_eq!(end(session.clone()).await["cancelled"], true);
        assert_eq!(end(session).await["cancelled"], false);
        assert_eq!(holds.open(), 0);
    }

    #[tokio::test]
    async fn first_notifications_read_does_not_replay_cues() {
        let (_dir, ctx) = context("http://127.0.0.1:1");
        {
            let mut manager = ctx.poller.manager().lock();
            for id in ["a", "b", "c"] {
                manager
                    .surface_mut()
                    .apply(Mutation::PlaySound { id: id.to_string() });
            }
        }
        let base = serve(router(ctx)).await;
        let get = |path: String| async move {
            reqwest::get(path).await.unwrap().json::<JsonValue>().await.unwrap()
        };

        let fresh = get(format!("{base}/api/notifications")).await;
        assert_eq!(fresh["last_cue"], 3);
        assert_eq!(fresh["sound_cues"], json!([]));

        let caught_up = get(format!("{base}/api/notifications?since=3")).await;
        assert_eq!(caught_up["sound_cues"], json!([]));

        let behind = get(format!("{base}/api/notifications?since=2")).await;
        assert_eq!(behind["sound_cues"], json!([{"seq": 3, "id": "c"}]));
    }

    #[tokio::test]
    async fn node_keys_are_stable_between_reads() {
        let (_dir, ctx) = context("http://127.0.0.1:1");
        let manager = ctx.poller.manager().clone();
        let batch = [
            crate::test_support::record("a", 10, "0:0"),
            crate::test_support::record("b", 20, "1:0"),
        ];
        manager.lock().reconcile(&batch).unwrap();
        let base = serve(router(ctx)).await;
        let keys = || async {
            let body: JsonValue = reqwest::get(format!("{base}/api/notifications"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            body["nodes"]
                .as_array()
                .unwrap()
                .iter()
                .map(|n| (n["id"].as_str().unwrap().to_string(), n["key"].as_u64().unwrap()))
                .collect::<Vec<_>>()
        };

        let before = keys().await;
        manager.lock().reconcile(&batch).unwrap();
        assert_eq!(keys().await, before);

        manager.lock().reconcile(&batch[..1]).unwrap();
        manager.lock().reconcile(&batch).unwrap();
        let after = keys().await;
        assert_eq!(after.len(), 3);
        let b_keys: Vec<u64> = after.iter().filter(|(id, _)| id == "b").map(|(_, k)| *k).collect();
        assert_eq!(b_keys.len(), 2);
        assert_ne!(b_keys[0], b_keys[1]);
    }

    #[tokio::test]
    async fn place_bet_preview_returns_dialog_text() {
        let (_dir, ctx) = context("http://127.0.0.1:1");
        let base = serve(router(ctx)).await;
        let http = reqwest::Client::new();

        let resp = http
            .post(format!("{base}/api/place_bet/preview"))
            .json(&json!({"bots": [], "details": {"provider": "auto"}, "stake": ""}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: JsonValue = resp.json().await.unwrap();
        assert_eq!(body["title"], "No bot specified");

        http.post(format!("{base}/api/bet_selection"))
            .json(&json!({"eventName": "A vs B", "betName": "1X2", "tipName": "1", "odds": 2.5, "selectionId": "77"}))
            .send()
            .await
            .unwrap();
        let body: JsonValue = http
            .post(format!("{base}/api/place_bet/preview"))
            .json(&json!({"bots": [{"id": 3, "name": "gamma"}], "details": {"provider": "auto"}, "stake": "4"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            body["text"],
            "Event: A vs B\nBet: 1X2\nTip: 1 (2.5)\n\nBots:\n- gamma\n\nStake: 4"
        );
    }

    #[tokio::test]
    async fn unknown_config_kind_is_not_found() {
        let (_dir, ctx) = context("http://127.0.0.1:1");
        let base = serve(router(ctx)).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/config/teams/1/trigger_time/toggle"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
