//! Self-contained preview documents for markup, style and script sources.
//!
//! Building is a pure function of `(language, source)`. The view layer mounts
//! the resulting document inside a sandboxed frame sized to a device preset.

use serde::Serialize;

use crate::errors::PlaygroundError;
use crate::executors::sandbox::{ConsoleChannel, NO_OUTPUT_SUCCESS};
use crate::language::{Language, PreviewKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewDocument {
    pub language: Language,
    pub html: String,
}

const STYLE_SHELL: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <style>__STYLE__</style>
</head>
<body>
  <div class="card">
    <h1 class="title">CSS Preview</h1>
    <p>Your CSS styles are applied here. Add HTML elements to see the full effect.</p>
  </div>
</body>
</html>
"#;

// The user source is spliced into a single-quoted string literal and run via
// direct eval inside a function whose `console` parameter is the proxy, so the
// page's real console object is never reassigned.
const SCRIPT_SHELL: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <style>
    body { font-family: Arial, sans-serif; padding: 20px; background: #f5f5f5; margin: 0; }
    .console {
      background: #1e1e1e;
      color: #00ff00;
      padding: 15px;
      border-radius: 8px;
      font-family: monospace;
      white-space: pre-wrap;
      margin-top: 10px;
      max-height: 400px;
      overflow-y: auto;
    }
    .title { color: #333; margin-bottom: 10px; }
    .error { color: #ff6b6b !important; }
  </style>
</head>
<body>
  <h2 class="title">JavaScript Preview</h2>
  <p>Check the console output below:</p>
  <div id="console" class="console">Ready to execute JavaScript...</div>
  <script>
    (function () {
      var consoleDiv = document.getElementById('console');
      consoleDiv.textContent = '';
      consoleDiv.className = 'console';

      var host = (typeof console !== 'undefined') ? console : {};
      var prefixes = __PREFIXES__;
      var written = false;

      function format(args) {
        var parts = [];
        for (var i = 0; i < args.length; i++) {
          var value = args[i];
          if (typeof value === 'string') {
            parts.push(value);
          } else if (value !== null && typeof value === 'object') {
            try { parts.push(JSON.stringify(value)); } catch (e) { parts.push(String(value)); }
          } else {
            parts.push(String(value));
          }
        }
        return parts.join(' ');
      }

      function addToConsole(message, type) {
        consoleDiv.textContent += prefixes[type] + message + '\n';
        written = true;
        if (type === 'error') {
          consoleDiv.classList.add('error');
        }
      }

      var proxy = {};
      ['log', 'info', 'warn', 'error'].forEach(function (type) {
        proxy[type] = function () {
          if (typeof host[type] === 'function') {
            host[type].apply(host, arguments);
          }
          addToConsole(format(arguments), type);
        };
      });
      proxy.debug = proxy.log;

      try {
        (function (console) {
          eval('__SOURCE__');
        })(proxy);
        if (!written) {
          addToConsole('__EMPTY__', 'log');
        }
      } catch (error) {
        var message = (error !== null && typeof error === 'object' && error.message !== undefined)
          ? error.message
          : String(error);
        addToConsole('Error: ' + message, 'error');
      }
    })();
  </script>
</body>
</html>
"#;

pub struct PreviewBuilder;

impl PreviewBuilder {
    pub fn build(language: Language, source: &str) -> Result<PreviewDocument, PlaygroundError> {
        let kind = language.preview_kind().ok_or_else(|| {
            PlaygroundError::ConfigurationError(format!(
                "Language '{}' has no visual preview",
                language
            ))
        })?;

        let html = match kind {
            PreviewKind::Document => source.to_string(),
            PreviewKind::Style => STYLE_SHELL.replacen("__STYLE__", source, 1),
            PreviewKind::Script => script_document(source),
        };

        Ok(PreviewDocument { language, html })
    }
}

fn script_document(source: &str) -> String {
    // Placeholders are filled in template order, so text substituted earlier
    // is never rescanned for a later placeholder.
    let (head, rest) = split_once_or_all(SCRIPT_SHELL, "__PREFIXES__");
    let (middle, rest) = split_once_or_all(rest, "__SOURCE__");
    let (tail, end) = split_once_or_all(rest, "__EMPTY__");

    let mut html = String::with_capacity(SCRIPT_SHELL.len() + source.len() * 2);
    html.push_str(head);
    html.push_str(&ConsoleChannel::prefix_table_json());
    html.push_str(middle);
    html.push_str(&escape_script_literal(source));
    html.push_str(tail);
    html.push_str(&escape_script_literal(NO_OUTPUT_SUCCESS));
    html.push_str(end);
    html
}

fn split_once_or_all<'a>(text: &'a str, marker: &str) -> (&'a str, &'a str) {
    text.split_once(marker).unwrap_or((text, ""))
}

/// Escape `source` for a single-quoted script string inside an HTML
/// `<script>` element. Covers every character that could end the literal,
/// start an interpolation, or close the element early.
pub fn escape_script_literal(source: &str) -> String {
    let mut escaped = String::with_capacity(source.len() + source.len() / 8);
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '`' => escaped.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => escaped.push_str("\\$"),
            '<' if chars.peek() == Some(&'/') => escaped.push_str("<\\"),
            '<' if chars.peek() == Some(&'!') => escaped.push_str("\\x3C"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            other => escaped.push(other),
        }
    }

    escaped
}

/// Static viewport sizes offered by the preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreset {
    Desktop,
    Tablet,
    Mobile,
    Iphone,
    Ipad,
}

impl DevicePreset {
    pub const ALL: [DevicePreset; 5] = [
        DevicePreset::Desktop,
        DevicePreset::Tablet,
        DevicePreset::Mobile,
        DevicePreset::Iphone,
        DevicePreset::Ipad,
    ];

    /// CSS width and height of the frame.
    pub fn dimensions(&self) -> (&'static str, &'static str) {
        match self {
            DevicePreset::Desktop => ("100%", "100%"),
            DevicePreset::Tablet => ("768px", "1024px"),
            DevicePreset::Mobile => ("375px", "667px"),
            DevicePreset::Iphone => ("414px", "736px"),
            DevicePreset::Ipad => ("820px", "1180px"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DevicePreset::Desktop => "Desktop",
            DevicePreset::Tablet => "Tablet",
            DevicePreset::Mobile => "Mobile",
            DevicePreset::Iphone => "iPhone",
            DevicePreset::Ipad => "iPad",
        }
    }
}

impl std::str::FromStr for DevicePreset {
    type Err = PlaygroundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        DevicePreset::ALL
            .iter()
            .copied()
            .find(|p| p.name().to_lowercase() == wanted)
            .ok_or_else(|| {
                PlaygroundError::ConfigurationError(format!("Unknown device preset: {}", s))
            })
    }
}

impl PreviewDocument {
    /// Host page that mounts this document in a sandboxed frame sized to
    /// `device`. Scripts may run inside the frame but it gets an opaque
    /// origin, so it cannot reach the host page.
    pub fn framed(&self, device: DevicePreset) -> String {
        let (width, height) = device.dimensions();
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <title>{language} preview ({device})</title>
  <style>
    html, body {{ height: 100%; margin: 0; }}
    body {{ display: flex; justify-content: center; align-items: center; background: #e2e8f0; }}
    iframe {{ width: {width}; height: {height}; max-width: 100%; max-height: 100%; border: none; background: white; }}
  </style>
</head>
<body>
  <iframe sandbox="allow-scripts" title="Code Preview" srcdoc="{srcdoc}"></iframe>
</body>
</html>
"#,
            language = self.language,
            device = device.name(),
            width = width,
            height = height,
            srcdoc = escape_attribute(&self.html),
        )
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + value.len() / 4);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}
