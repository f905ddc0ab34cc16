//! The single page served at `/`. Text comes from the active preset and is
//! injected as JSON; the script only sets `textContent`, never HTML.

use crate::preset::Wording;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="ko">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title></title>
<style>
  body { font-family: sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }
  #preview { max-width: 100%; display: none; margin: 1rem 0; }
  #result.ok { color: #1a7f37; }
  #result.fail, #result.error { color: #cf222e; }
  .notice { background: #fff8c5; padding: 0.5rem 1rem; }
</style>
</head>
<body>
<h1 id="title"></h1>
<p id="description"></p>
<p id="notice" class="notice" hidden></p>
<label><span id="upload-label"></span><br>
  <input id="file" type="file" accept=".png,.jpg,.jpeg,image/png,image/jpeg">
</label>
<figure>
  <img id="preview" alt="">
  <figcaption id="caption" hidden></figcaption>
</figure>
<button id="start" disabled></button>
<p id="status"></p>
<p id="result"></p>
<script>
const WORDING = __WORDING__;
const $ = (id) => document.getElementById(id);
let session = null;
let busy = false;

$("title").textContent = WORDING.title;
document.title = WORDING.title;
$("description").textContent = WORDING.description;
$("upload-label").textContent = WORDING.upload_label;
$("caption").textContent = WORDING.image_caption;
$("start").textContent = WORDING.button_label;
if (WORDING.eligibility_notice) {
  $("notice").textContent = WORDING.eligibility_notice;
  $("notice").hidden = false;
}

function show(text, kind) {
  $("result").textContent = text;
  $("result").className = kind || "";
}

async function errorText(resp) {
  try {
    const body = await resp.json();
    return (body.errors || []).join("\n") || resp.statusText;
  } catch (_) {
    return resp.statusText;
  }
}

async function ensureSession() {
  if (session) return session;
  const resp = await fetch("/sessions", { method: "POST" });
  session = (await resp.json()).id;
  return session;
}

$("file").addEventListener("change", async (ev) => {
  const file = ev.target.files[0];
  $("start").disabled = true;
  $("preview").style.display = "none";
  $("caption").hidden = true;
  show("");
  if (!file || busy) return;

  const id = await ensureSession();
  const form = new FormData();
  form.append("file", file, file.name);
  const resp = await fetch(`/sessions/${id}/image`, { method: "POST", body: form });
  if (!resp.ok) {
    show(await errorText(resp), "error");
    return;
  }
  $("preview").src = `/sessions/${id}/image?t=${Date.now()}`;
  $("preview").style.display = "block";
  $("caption").hidden = false;
  $("start").disabled = false;
});

$("start").addEventListener("click", async () => {
  if (busy || !session) return;
  busy = true;
  $("start").disabled = true;
  $("file").disabled = true;
  $("status").textContent = WORDING.processing_label;
  show("");
  try {
    const resp = await fetch(`/sessions/${session}/classify`, { method: "POST" });
    if (resp.ok) {
      const verdict = await resp.json();
      show(verdict.message, verdict.eligible ? "ok" : "fail");
    } else {
      show(await errorText(resp), "error");
    }
  } catch (err) {
    show(String(err), "error");
  } finally {
    busy = false;
    $("status").textContent = "";
    $("start").disabled = false;
    $("file").disabled = false;
  }
});

window.addEventListener("pagehide", () => {
  if (session) fetch(`/sessions/${session}`, { method: "DELETE", keepalive: true });
});
</script>
</body>
</html>
"#;

/// Render the page for `wording`
pub fn render(wording: &Wording) -> String {
    // `</` inside a script block would end it early
    let json = serde_json::to_string(wording)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");
    TEMPLATE.replace("__WORDING__", &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::Preset;

    #[test]
    fn test_render_injects_wording() {
        let html = render(Preset::ScooterRental.wording());
        assert!(!html.contains("__WORDING__"));
        assert!(html.contains("킥보드 대여 헬멧 확인"));
        assert!(html.contains("\"eligibility_notice\":"));
    }

    #[test]
    fn test_render_generic() {
        let html = render(Preset::Generic.wording());
        assert!(html.contains("헬멧 착용 여부 판별기"));
        assert!(html.contains("\"eligibility_notice\":null"));
    }
}
