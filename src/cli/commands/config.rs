//! Config command - print effective settings.

use crate::config::Settings;

pub fn run(settings: &Settings) -> anyhow::Result<()> {
    println!("{}", render(settings)?);
    Ok(())
}

/// Settings as TOML with the token masked.
fn render(settings: &Settings) -> anyhow::Result<String> {
    Ok(settings.redacted().to_toml()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_masks_token() {
        let mut settings = Settings::default();
        settings.server.token = Some("very-secret".into());

        let out = render(&settings).unwrap();
        assert!(out.contains("[server]"));
        assert!(out.contains("transport = \"stdio\""));
        assert!(!out.contains("very-secret"));
    }
}
