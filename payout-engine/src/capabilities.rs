//! Optional capabilities injected at construction
//!
//! Human verification and donation-address rendering (QR images) live outside
//! the engine. Each is switched on by configuration; construction fails if a
//! switch is on but no implementation was supplied. Switched-off capabilities
//! resolve to no-op implementations.

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Decides whether a requester is human
#[async_trait]
pub trait HumanVerifier: Send + Sync {
    /// Check a challenge/response pair submitted from `remote_ip`
    async fn verify(&self, challenge: &str, response: &str, remote_ip: &str) -> Result<bool>;

    /// Markup embedding the challenge widget
    fn widget_html(&self) -> String;
}

/// Renders the donation address (e.g. writes a QR image)
pub trait AddressRenderer: Send + Sync {
    /// Render `address`
    fn render(&self, address: &str) -> Result<()>;
}

/// Verifier that lets everyone through
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVerifier;

#[async_trait]
impl HumanVerifier for NoopVerifier {
    async fn verify(&self, _challenge: &str, _response: &str, _remote_ip: &str) -> Result<bool> {
        Ok(true)
    }

    fn widget_html(&self) -> String {
        String::new()
    }
}

/// Renderer that draws nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl AddressRenderer for NoopRenderer {
    fn render(&self, _address: &str) -> Result<()> {
        Ok(())
    }
}

/// Capability implementations supplied by the embedding application
#[derive(Clone, Default)]
pub struct Capabilities {
    verifier: Option<Arc<dyn HumanVerifier>>,
    renderer: Option<Arc<dyn AddressRenderer>>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("verifier", &self.verifier.is_some())
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

impl Capabilities {
    /// No capabilities supplied
    pub fn none() -> Self {
        Self::default()
    }

    /// Supply a human verifier
    pub fn with_verifier(mut self, verifier: Arc<dyn HumanVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Supply an address renderer
    pub fn with_renderer(mut self, renderer: Arc<dyn AddressRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Pick the implementations `config` asks for
    pub(crate) fn resolve(self, config: &Config) -> Result<ResolvedCapabilities> {
        let verifier: Arc<dyn HumanVerifier> = if config.captcha.enabled {
            self.verifier.ok_or_else(|| {
                Error::Config(
                    "captcha.enabled is set but no human verifier was supplied".to_string(),
                )
            })?
        } else {
            Arc::new(NoopVerifier)
        };

        let renderer: Arc<dyn AddressRenderer> = if config.qrcode.generate {
            self.renderer.ok_or_else(|| {
                Error::Config(
                    "qrcode.generate is set but no address renderer was supplied".to_string(),
                )
            })?
        } else {
            Arc::new(NoopRenderer)
        };

        Ok(ResolvedCapabilities {
            verifier,
            renderer,
            captcha_enabled: config.captcha.enabled,
            render_enabled: config.qrcode.generate,
        })
    }
}

/// Capabilities after resolution against configuration
#[derive(Clone)]
pub(crate) struct ResolvedCapabilities {
    pub(crate) verifier: Arc<dyn HumanVerifier>,
    pub(crate) renderer: Arc<dyn AddressRenderer>,
    pub(crate) captcha_enabled: bool,
    pub(crate) render_enabled: bool,
}

impl std::fmt::Debug for ResolvedCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCapabilities")
            .field("captcha_enabled", &self.captcha_enabled)
            .field("render_enabled", &self.render_enabled)
            .finish_non_exhaustive()
    }
}
