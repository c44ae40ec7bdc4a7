//! The script injected into the page's main world.
//!
//! It waits for `load`, adds the scoped style through the host's `addStyle`,
//! wires `window.onClick` to the exposed capability and appends the button.

/// Class of the injected container. Every style rule is scoped to it.
pub const CONTAINER_CLASS: &str = "example";

pub const MARKUP: &str = r#"<button onclick="window.onClick()">Hello, world! Press me</button>"#;

pub const STYLE: &str = "
.example {
  background-color: black;
  color: white;
  z-index: 10000;
  position: absolute;
  top: 10px;
  left: 10px;
  padding: 10px;
}
";

/// Build the self-invoking script that calls `window[object][method]()` on click.
pub fn script(object: &str, method: &str) -> String {
    format!(
        r#"(function() {{
  function inject() {{
    window.jancyAPI.addStyle(`{style}`)

    window.onClick = function() {{
      window.{object}.{method}()
    }}

    const node = document.createElement('div')
    node.classList.add("{class}")
    node.innerHTML = `{markup}`
    document.body.appendChild(node)
  }}

  window.addEventListener('load', inject)
}})()"#,
        style = template_literal(STYLE),
        markup = template_literal(MARKUP),
        class = CONTAINER_CLASS,
    )
}

/// Escape `s` for use inside a JS template literal.
fn template_literal(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}
