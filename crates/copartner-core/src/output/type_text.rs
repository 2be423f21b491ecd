//! Type-text sink: types replies at the cursor using enigo.

use enigo::{Enigo, Keyboard, Settings};

use super::ReplySink;

pub struct TypeTextSink;

impl ReplySink for TypeTextSink {
    fn speak(&self, text: &str) -> anyhow::Result<()> {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("failed to init enigo: {e}"))?;
        enigo
            .text(text)
            .map_err(|e| anyhow::anyhow!("failed to type reply: {e}"))?;
        log::debug!("TypeTextSink: typed {} chars", text.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "type-text"
    }
}
