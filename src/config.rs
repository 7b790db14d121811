//! Process-wide session configuration.
//!
//! Mutated only by `iscale`/`dscale`/`color` messages and read by every
//! render request. The dispatch loop is strictly sequential, so no locking
//! is needed; a change takes effect for subsequent requests only and never
//! invalidates artifacts that were already cached.

/// Which of the two independent scale factors a scale message updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleKind {
    /// Multiplier applied to every pixel computation (HiDPI rendering)
    Internal,
    /// Extra multiplier for the dynamic-sizing probe
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub internal_scale: f64,
    pub dynamic_scale: f64,
    /// Session-wide foreground override. When set it wins over the color
    /// carried by individual render requests.
    pub foreground: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            internal_scale: 1.0,
            dynamic_scale: 1.0,
            foreground: None,
        }
    }
}

impl SessionConfig {
    pub fn set_scale(&mut self, kind: ScaleKind, value: f64) {
        match kind {
            ScaleKind::Internal => self.internal_scale = value,
            ScaleKind::Dynamic => self.dynamic_scale = value,
        }
    }

    pub fn set_foreground(&mut self, color: String) {
        self.foreground = Some(color);
    }

    /// The color to substitute into the markup for a given request.
    pub fn effective_color<'a>(&'a self, request_color: &'a str) -> &'a str {
        self.foreground.as_deref().unwrap_or(request_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_color_is_used_until_a_session_override_arrives() {
        let mut config = SessionConfig::default();
        assert_eq!(config.effective_color("#ff0000"), "#ff0000");

        config.set_foreground("#00ff00".to_string());
        assert_eq!(config.effective_color("#ff0000"), "#00ff00");
    }

    #[test]
    fn scale_updates_are_independent() {
        let mut config = SessionConfig::default();
        config.set_scale(ScaleKind::Internal, 2.0);
        assert_eq!(config.internal_scale, 2.0);
        assert_eq!(config.dynamic_scale, 1.0);

        config.set_scale(ScaleKind::Dynamic, 0.5);
        assert_eq!(config.dynamic_scale, 0.5);
        assert_eq!(config.internal_scale, 2.0);
    }
}
