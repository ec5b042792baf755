use anyhow::{bail, Result};
use renderer::FlipDirection;

/// One scripted gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptStep {
    /// Drag and commit a flip.
    Flip(FlipDirection),
    /// Drag halfway, then let the page fall back.
    Cancel(FlipDirection),
}

/// Gesture list given on the command line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script(pub Vec<ScriptStep>);

/// Parses a comma separated gesture list such as `f,f,b,~f`.
///
/// `f`/`forward` and `b`/`back`/`backward` flip; a leading `~` cancels the
/// drag instead of committing it.
pub fn parse_script(raw: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let (cancel, name) = match token.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let direction = match name.to_ascii_lowercase().as_str() {
            "f" | "forward" => FlipDirection::Forward,
            "b" | "back" | "backward" => FlipDirection::Backward,
            other => bail!("unknown script step '{other}' (expected f, b, ~f or ~b)"),
        };
        steps.push(if cancel {
            ScriptStep::Cancel(direction)
        } else {
            ScriptStep::Flip(direction)
        });
    }
    Ok(steps)
}
