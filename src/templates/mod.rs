/// Returns the placeholder HTML shown on first run and after deleting the
/// active project.
pub fn default_html() -> &'static str {
    r#"<h1>Welcome to Alexr Code!</h1>
<p>Write HTML, CSS and JavaScript, then press Run to see it live.</p>
"#
}

/// Returns the placeholder stylesheet.
pub fn default_css() -> &'static str {
    r#"h1 {
  color: #4a6cf7;
}
"#
}

/// Returns the placeholder script.
pub fn default_js() -> &'static str {
    r#"console.log("Hello from Alexr Code!");
"#
}

/// Baseline rule injected ahead of the user's CSS so an empty stylesheet
/// still yields a readable preview.
pub fn baseline_body_rule() -> &'static str {
    "body { font-family: system-ui, -apple-system, sans-serif; margin: 8px; color: #222; }"
}

/// Console-capture bootstrap injected at the top of every preview document.
///
/// Wraps the five console severities and `window.onerror`, forwards each
/// call to the native implementation, and posts encoded batches to the
/// local bridge endpoint tagged with the render token. Installed before
/// any external or user script so no output is missed.
pub fn bridge_bootstrap(port: u16, token: u64) -> String {
    BOOTSTRAP_TEMPLATE
        .replace("__PORT__", &port.to_string())
        .replace("__TOKEN__", &token.to_string())
}

const BOOTSTRAP_TEMPLATE: &str = r#"(function () {
  "use strict";
  var ENDPOINT = "http://127.0.0.1:__PORT__/console";
  var TOKEN = __TOKEN__;
  var seq = 0;
  var queue = [];
  var scheduled = false;

  function flush() {
    scheduled = false;
    if (queue.length === 0) { return; }
    var batch = queue;
    queue = [];
    try {
      fetch(ENDPOINT, {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify({ token: TOKEN, entries: batch }),
        keepalive: true
      });
    } catch (_e) { /* bridge unreachable; native console still works */ }
  }

  function schedule() {
    if (!scheduled) {
      scheduled = true;
      setTimeout(flush, 0);
    }
  }

  function encode(value) {
    if (value instanceof Error) {
      return {
        __error: true,
        message: String(value.message),
        stack: value.stack ? String(value.stack) : null
      };
    }
    var kind = typeof value;
    if (kind === "function") { return "[function]"; }
    if (kind === "undefined") { return "undefined"; }
    if (value !== null && kind === "object") {
      try {
        return JSON.parse(JSON.stringify(value, function (k, v) {
          return typeof v === "function" ? "[function]" : v;
        }));
      } catch (_e) {
        return String(value);
      }
    }
    return value;
  }

  function push(severity, list, uncaught, source) {
    var args = [];
    for (var i = 0; i < list.length; i++) { args.push(encode(list[i])); }
    queue.push({
      seq: seq,
      severity: severity,
      args: args,
      uncaught: uncaught,
      source: source
    });
    seq += 1;
    schedule();
  }

  var severities = ["log", "info", "warn", "error", "debug"];
  for (var i = 0; i < severities.length; i++) {
    (function (name) {
      var original = console[name];
      console[name] = function () {
        if (original) { original.apply(console, arguments); }
        push(name, arguments, false, null);
      };
    })(severities[i]);
  }

  var previousOnError = window.onerror;
  window.onerror = function (message, source, lineno, colno, error) {
    push("error", [String(message)], true, source || null);
    if (previousOnError) {
      previousOnError.apply(window, arguments);
    }
    return true;
  };
})();
"#;

/// System prompt shared by every assistant action.
pub const ASSISTANT_SYSTEM_PROMPT: &str = "You are an expert code assistant. \
You provide clear, concise, and accurate information. When providing code, \
use Markdown code blocks.";

/// Builds the user prompt for an assistant action. Only the three known
/// actions produce a prompt; anything else yields an empty string.
pub fn assistant_prompt(action: &str, code: &str) -> String {
    match action {
        "explain" => format!(
            "Please explain the following code in simple terms. Describe its \
             purpose, inputs, and outputs.\n\n```javascript\n{code}\n```"
        ),
        "findBugs" => format!(
            "Analyze the following code for potential bugs, errors, or \
             performance issues. If no bugs are found, say so. List any \
             issues you find clearly.\n\n```javascript\n{code}\n```"
        ),
        "refactor" => format!(
            "Please refactor the following code to be more efficient, \
             readable, or to use modern syntax. Provide only the refactored \
             code inside a single markdown code block.\n\n```javascript\n{code}\n```"
        ),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_substitutes_port_and_token() {
        let script = bridge_bootstrap(17893, 42);
        assert!(script.contains("http://127.0.0.1:17893/console"));
        assert!(script.contains("var TOKEN = 42;"));
        assert!(!script.contains("__PORT__"));
        assert!(!script.contains("__TOKEN__"));
    }

    #[test]
    fn known_actions_embed_the_code() {
        for action in ["explain", "findBugs", "refactor"] {
            let prompt = assistant_prompt(action, "let x = 1;");
            assert!(prompt.contains("let x = 1;"), "{action} lost the code");
            assert!(prompt.contains("```javascript"));
        }
    }

    #[test]
    fn unknown_action_yields_empty_prompt() {
        assert_eq!(assistant_prompt("summon", "let x = 1;"), "");
    }
}
