use serde::{Deserialize, Serialize};

use crate::commands::console::{ConsoleBridgeState, BRIDGE_PORT};
use crate::commands::session::{ResourceConfig, SessionState};
use crate::templates;

/// Current editor contents. Passed through untouched: malformed markup or
/// script is the preview document's problem, never the renderer's.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSources {
    pub html_source: String,
    pub css_source: String,
    pub js_source: String,
}

/// One fully built preview document plus the render token its console
/// output will carry.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewDocument {
    pub token: u64,
    pub html: String,
}

/// Target-agnostic sink for sandbox document construction. The iframe
/// implementation below renders to an `srcdoc` string; tests drive the
/// same sequence through a recording fake.
pub trait DocumentBuilder {
    fn reset(&mut self);
    fn append_stylesheet_link(&mut self, url: &str);
    fn append_style_block(&mut self, css: &str);
    fn set_body_markup(&mut self, html: &str);
    fn append_script_src(&mut self, url: &str);
    fn append_inline_script(&mut self, js: &str);
}

/// Drives a builder through one complete render, in the only order the
/// sandbox accepts: stylesheets and style block into the head, markup into
/// the body, external scripts before the inline user script.
pub fn build_preview<B: DocumentBuilder>(
    builder: &mut B,
    sources: &PreviewSources,
    resources: &ResourceConfig,
) {
    builder.reset();

    for url in &resources.external_css_urls {
        builder.append_stylesheet_link(url);
    }
    builder.append_style_block(&format!(
        "{}\n{}",
        templates::baseline_body_rule(),
        sources.css_source
    ));

    builder.set_body_markup(&sources.html_source);

    for url in &resources.external_js_urls {
        builder.append_script_src(url);
    }
    builder.append_inline_script(&sources.js_source);
}

/// Builds `<iframe srcdoc>` documents. The diagnostics bootstrap is part
/// of the builder itself: it is emitted at the top of the head on every
/// `finish()`, so console and error hooks are installed before any
/// injected stylesheet, external script, or user code runs.
pub struct HtmlDocumentBuilder {
    bootstrap: String,
    head: String,
    body_markup: String,
    scripts: String,
}

impl HtmlDocumentBuilder {
    pub fn new(bridge_port: u16, token: u64) -> Self {
        Self {
            bootstrap: templates::bridge_bootstrap(bridge_port, token),
            head: String::new(),
            body_markup: String::new(),
            scripts: String::new(),
        }
    }

    /// Assembles the document. Deterministic for a fixed build sequence.
    pub fn finish(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <script>\n{bootstrap}</script>\n{head}</head>\n<body>\n\
             {body}\n{scripts}</body>\n</html>",
            bootstrap = self.bootstrap,
            head = self.head,
            body = self.body_markup,
            scripts = self.scripts,
        )
    }
}

impl DocumentBuilder for HtmlDocumentBuilder {
    fn reset(&mut self) {
        self.head.clear();
        self.body_markup.clear();
        self.scripts.clear();
    }

    fn append_stylesheet_link(&mut self, url: &str) {
        self.head.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{}\">\n",
            escape_attr(url)
        ));
    }

    fn append_style_block(&mut self, css: &str) {
        self.head.push_str(&format!("<style>\n{css}\n</style>\n"));
    }

    fn set_body_markup(&mut self, html: &str) {
        self.body_markup = html.to_string();
    }

    fn append_script_src(&mut self, url: &str) {
        self.scripts.push_str(&format!(
            "<script src=\"{}\"></script>\n",
            escape_attr(url)
        ));
    }

    fn append_inline_script(&mut self, js: &str) {
        self.scripts.push_str(&format!("<script>\n{js}\n</script>\n"));
    }
}

/// Minimal escaping for attribute values. Source text is intentionally not
/// escaped anywhere (the user is running their own code), but a URL must
/// not be able to break out of its attribute.
fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Builds a fresh preview document from the given sources and the session's
/// current resource configuration. Starts a new console cycle first, so the
/// returned token invalidates all output of the previous render.
#[tauri::command]
pub async fn render_preview(
    sources: PreviewSources,
    session: tauri::State<'_, SessionState>,
    bridge: tauri::State<'_, ConsoleBridgeState>,
) -> crate::error::Result<PreviewDocument> {
    let resources = session.resources_snapshot().await;
    let token = bridge.begin_cycle().await;

    let mut builder = HtmlDocumentBuilder::new(BRIDGE_PORT, token);
    build_preview(&mut builder, &sources, &resources);

    Ok(PreviewDocument {
        token,
        html: builder.finish(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(html: &str, css: &str, js: &str) -> PreviewSources {
        PreviewSources {
            html_source: html.into(),
            css_source: css.into(),
            js_source: js.into(),
        }
    }

    fn resources(css: &[&str], js: &[&str]) -> ResourceConfig {
        ResourceConfig {
            external_css_urls: css.iter().map(|s| s.to_string()).collect(),
            external_js_urls: js.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[derive(Debug, PartialEq)]
    enum Op {
        Reset,
        Link(String),
        Style(String),
        Body(String),
        ScriptSrc(String),
        InlineScript(String),
    }

    #[derive(Default)]
    struct RecordingBuilder {
        ops: Vec<Op>,
    }

    impl DocumentBuilder for RecordingBuilder {
        fn reset(&mut self) {
            self.ops.push(Op::Reset);
        }
        fn append_stylesheet_link(&mut self, url: &str) {
            self.ops.push(Op::Link(url.into()));
        }
        fn append_style_block(&mut self, css: &str) {
            self.ops.push(Op::Style(css.into()));
        }
        fn set_body_markup(&mut self, html: &str) {
            self.ops.push(Op::Body(html.into()));
        }
        fn append_script_src(&mut self, url: &str) {
            self.ops.push(Op::ScriptSrc(url.into()));
        }
        fn append_inline_script(&mut self, js: &str) {
            self.ops.push(Op::InlineScript(js.into()));
        }
    }

    #[test]
    fn build_sequence_preserves_resource_order() {
        let mut builder = RecordingBuilder::default();
        build_preview(
            &mut builder,
            &sources("<h1>Hi</h1>", "h1{color:red}", "console.log('x')"),
            &resources(&["a.css", "b.css"], &["one.js", "two.js"]),
        );

        let links: Vec<&Op> = builder
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Link(_)))
            .collect();
        assert_eq!(links, vec![&Op::Link("a.css".into()), &Op::Link("b.css".into())]);

        let script_positions: Vec<usize> = builder
            .ops
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, Op::ScriptSrc(_)))
            .map(|(i, _)| i)
            .collect();
        let inline_position = builder
            .ops
            .iter()
            .position(|op| matches!(op, Op::InlineScript(_)))
            .unwrap();

        // Every external script precedes the inline user script
        assert!(script_positions.iter().all(|&p| p < inline_position));
        assert_eq!(builder.ops.first(), Some(&Op::Reset));
    }

    #[test]
    fn style_block_puts_baseline_before_user_css() {
        let mut builder = RecordingBuilder::default();
        build_preview(
            &mut builder,
            &sources("", "h1{color:red}", ""),
            &resources(&[], &[]),
        );

        let style = builder
            .ops
            .iter()
            .find_map(|op| match op {
                Op::Style(css) => Some(css.clone()),
                _ => None,
            })
            .unwrap();
        let baseline_at = style.find("body {").unwrap();
        let user_at = style.find("h1{color:red}").unwrap();
        assert!(baseline_at < user_at);
    }

    #[test]
    fn rendered_document_orders_external_before_user_code() {
        let mut builder = HtmlDocumentBuilder::new(BRIDGE_PORT, 7);
        build_preview(
            &mut builder,
            &sources("<h1>Hi</h1>", "h1{color:red}", "console.log('x')"),
            &resources(&["https://cdn.example/reset.css"], &["https://cdn.example/lib.js"]),
        );
        let html = builder.finish();

        let bootstrap = html.find("var TOKEN = 7;").unwrap();
        let link = html.find("reset.css").unwrap();
        let style = html.find("h1{color:red}").unwrap();
        let body = html.find("<h1>Hi</h1>").unwrap();
        let ext_script = html.find("lib.js").unwrap();
        let inline = html.find("console.log('x')").unwrap();

        assert!(bootstrap < link, "hooks install before external CSS");
        assert!(link < style);
        assert!(style < body);
        assert!(body < ext_script);
        assert!(ext_script < inline, "external scripts precede user script");
    }

    #[test]
    fn render_is_deterministic_for_fixed_input() {
        let input = sources("<p>x</p>", "p{}", "1+1");
        let config = resources(&["a.css"], &["b.js"]);

        let mut first = HtmlDocumentBuilder::new(BRIDGE_PORT, 3);
        build_preview(&mut first, &input, &config);
        let mut second = HtmlDocumentBuilder::new(BRIDGE_PORT, 3);
        build_preview(&mut second, &input, &config);

        assert_eq!(first.finish(), second.finish());
    }

    #[test]
    fn body_markup_passes_through_unescaped() {
        let mut builder = HtmlDocumentBuilder::new(BRIDGE_PORT, 1);
        build_preview(
            &mut builder,
            &sources("<h1 class=\"big\">Hi & bye</h1>", "", ""),
            &resources(&[], &[]),
        );
        assert!(builder.finish().contains("<h1 class=\"big\">Hi & bye</h1>"));
    }

    #[test]
    fn urls_cannot_break_out_of_their_attribute() {
        let mut builder = HtmlDocumentBuilder::new(BRIDGE_PORT, 1);
        builder.append_stylesheet_link("https://x/\"><script>bad()</script>");
        let html = builder.finish();
        assert!(!html.contains("\"><script>bad()"));
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
    }

    #[test]
    fn reset_discards_prior_render_content() {
        let mut builder = HtmlDocumentBuilder::new(BRIDGE_PORT, 1);
        build_preview(
            &mut builder,
            &sources("<p>old</p>", "", ""),
            &resources(&["old.css"], &[]),
        );
        build_preview(
            &mut builder,
            &sources("<p>new</p>", "", ""),
            &resources(&[], &[]),
        );
        let html = builder.finish();
        assert!(!html.contains("old"));
        assert!(html.contains("<p>new</p>"));
    }
}
