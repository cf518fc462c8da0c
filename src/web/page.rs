use crate::{
    error::AppError,
    media::VideoMetadata,
    utils::{escape_html, format_duration, format_number},
};
use uuid::Uuid;

pub fn render_metadata_panel(metadata: &VideoMetadata) -> String {
    let thumbnail = if metadata.thumbnail_url.is_empty() {
        String::new()
    } else {
        format!(
            r#"<img class="thumb" src="{}" alt="thumbnail">"#,
            escape_html(&metadata.thumbnail_url)
        )
    };

    format!(
        r#"<div class="panel">{thumbnail}<div class="details"><h2>{title}</h2><p>Duration: {duration}</p><p>Channel: {channel}</p><p>Views: {views}</p></div></div>"#,
        title = escape_html(&metadata.title),
        duration = format_duration(metadata.duration_seconds),
        channel = escape_html(&metadata.channel),
        views = format_number(metadata.view_count),
    )
}

pub fn render_error(error: &AppError) -> String {
    let message = match error {
        AppError::Validation(message) => message.clone(),
        other => format!("An error occurred: {}", other),
    };
    format!(r#"<div class="error">{}</div>"#, escape_html(&message))
}

pub fn render_page(session: &Uuid) -> String {
    PAGE_TEMPLATE.replace("{{SESSION}}", &session.to_string())
}

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>YouTube Video Downloader</title>
<style>
body { font-family: sans-serif; max-width: 720px; margin: 2em auto; padding: 0 1em; }
input[type=text] { width: 100%; padding: .5em; }
.error { color: #b00020; margin: .5em 0; }
.panel { display: flex; gap: 1em; margin: 1em 0; }
.thumb { width: 240px; }
progress { width: 100%; }
.hidden { display: none; }
</style>
</head>
<body data-session="{{SESSION}}">
<h1>YouTube Video Downloader</h1>
<p>Enter the URL of a YouTube video, then download it as video or audio.</p>
<label for="url">YouTube Video URL</label>
<input type="text" id="url" autocomplete="off">
<div id="message"></div>
<div id="details"></div>
<div id="controls" class="hidden">
  <fieldset>
    <legend>Download type</legend>
    <label><input type="radio" name="mode" value="video" checked> Video</label>
    <label><input type="radio" name="mode" value="audio"> Audio</label>
  </fieldset>
  <fieldset id="quality-box">
    <legend>Quality</legend>
    <label><input type="radio" name="quality" value="low"> Low</label>
    <label><input type="radio" name="quality" value="medium"> Medium</label>
    <label><input type="radio" name="quality" value="high" checked> High</label>
  </fieldset>
  <button id="download">Download</button>
  <progress id="bar" max="1" value="0"></progress>
  <div id="status"></div>
  <div id="save"></div>
</div>
<script>
const session = document.body.dataset.session;
const $ = (id) => document.getElementById(id);
let poller = null;

function resetView() {
  $("message").innerHTML = "";
  $("details").innerHTML = "";
  $("save").innerHTML = "";
  $("status").textContent = "";
  $("bar").value = 0;
  $("controls").classList.add("hidden");
}

async function showError(response) {
  const body = await response.json().catch(() => ({ html: "Unexpected server response" }));
  $("message").innerHTML = body.html;
}

$("url").addEventListener("change", async () => {
  resetView();
  const url = $("url").value;
  if (!url.trim()) return;
  $("message").textContent = "Loading video info...";
  const response = await fetch("/api/info", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ session, url }),
  });
  $("message").textContent = "";
  if (!response.ok) return showError(response);
  const body = await response.json();
  $("details").innerHTML = body.panel;
  $("controls").classList.remove("hidden");
});

document.querySelectorAll("input[name=mode]").forEach((el) =>
  el.addEventListener("change", () => {
    const video = document.querySelector("input[name=mode]:checked").value === "video";
    $("quality-box").classList.toggle("hidden", !video);
  })
);

async function pollProgress() {
  const response = await fetch(`/api/progress/${session}`);
  if (!response.ok) return;
  const view = await response.json();
  $("bar").value = view.fraction;
  if (view.status_line) $("status").textContent = view.status_line;
}

$("download").addEventListener("click", async () => {
  const mode = document.querySelector("input[name=mode]:checked").value;
  const quality = document.querySelector("input[name=quality]:checked").value;
  $("download").disabled = true;
  $("message").innerHTML = "";
  $("save").innerHTML = "";
  $("bar").value = 0;
  $("status").textContent = "Starting download...";
  poller = setInterval(pollProgress, 500);
  try {
    const response = await fetch("/api/download", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({ session, mode, quality: mode === "video" ? quality : null }),
    });
    if (!response.ok) {
      $("status").textContent = "";
      return showError(response);
    }
    const filename = decodeURIComponent(response.headers.get("X-Download-Filename") || "download");
    const blob = await response.blob();
    const link = document.createElement("a");
    link.href = URL.createObjectURL(blob);
    link.download = filename;
    link.textContent = `Click to save ${filename}`;
    $("save").appendChild(link);
    $("bar").value = 1;
    $("status").textContent = "Download complete";
  } finally {
    clearInterval(poller);
    $("download").disabled = false;
  }
});

window.addEventListener("pagehide", () => {
  navigator.sendBeacon(`/api/session/${session}/end`);
});
</script>
</body>
</html>
"#;
