//! Configuration types for office-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One config drives a single conversion
//! or a whole batch; the same value is handed to every stage.

use crate::bridge::Endpoint;
use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::time::Duration;

/// Configuration for an office-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_office2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .endpoint("localhost:2002")
///     .quality(90)
///     .watermark("DRAFT")
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint.port, 2002);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Where the engine's automation bridge listens. Default: `127.0.0.1:2002`.
    pub endpoint: Endpoint,

    /// Bound on establishing the bridge connection, in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Bound on every remote call, in seconds. Default: 120.
    ///
    /// The engine gives no latency guarantee for any call; loading a large
    /// deck or exporting hundreds of slides can take minutes. A breach is
    /// fatal to the session since a late reply may still arrive.
    pub call_timeout_secs: u64,

    /// Clear the `Shadow` property of every presentation shape before
    /// export. Default: true.
    pub remove_shadows: bool,

    /// `UseLosslessCompression` for presentation exports. Default: false.
    pub lossless_compression: bool,

    /// `Quality` for presentation exports. Default: 80.
    ///
    /// Passed to the export filter verbatim. The filter documents a 0–100
    /// range and rejects what it cannot use; this crate does not clamp.
    pub quality: i32,

    /// `Watermark` text for text-document exports. Default: none (the
    /// option is omitted entirely).
    pub watermark: Option<String>,

    /// Stop a batch at the first failed document. Default: false.
    pub fail_fast: bool,

    /// Optional progress callback for batch events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            connect_timeout_secs: 10,
            call_timeout_secs: 120,
            remove_shadows: true,
            lossless_compression: false,
            quality: 80,
            watermark: None,
            fail_fast: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("endpoint", &self.endpoint)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("remove_shadows", &self.remove_shadows)
            .field("lossless_compression", &self.lossless_compression)
            .field("quality", &self.quality)
            .field("watermark", &self.watermark)
            .field("fail_fast", &self.fail_fast)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
            endpoint: None,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
    /// Raw endpoint text, parsed in [`build`](Self::build).
    endpoint: Option<String>,
}

impl ConversionConfigBuilder {
    /// `host:port` or a `socket,host=…,port=…;urp` connection string.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn call_timeout_secs(mut self, secs: u64) -> Self {
        self.config.call_timeout_secs = secs;
        self
    }

    pub fn remove_shadows(mut self, v: bool) -> Self {
        self.config.remove_shadows = v;
        self
    }

    pub fn lossless_compression(mut self, v: bool) -> Self {
        self.config.lossless_compression = v;
        self
    }

    pub fn quality(mut self, q: i32) -> Self {
        self.config.quality = q;
        self
    }

    pub fn watermark(mut self, text: impl Into<String>) -> Self {
        self.config.watermark = Some(text.into());
        self
    }

    pub fn fail_fast(mut self, v: bool) -> Self {
        self.config.fail_fast = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ConversionConfig, ConvertError> {
        if let Some(raw) = self.endpoint.take() {
            self.config.endpoint = raw.parse()?;
        }

        let c = &self.config;
        if c.connect_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Connect timeout must be ≥ 1 second".into(),
            ));
        }
        if c.call_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Call timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.endpoint.to_string(), "127.0.0.1:2002");
        assert_eq!(c.quality, 80);
        assert!(!c.lossless_compression);
        assert!(c.remove_shadows);
        assert!(c.watermark.is_none());
        assert_eq!(c.call_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn builder_parses_endpoint() {
        let c = ConversionConfig::builder()
            .endpoint("socket,host=office,port=8100;urp;StarOffice.ComponentContext")
            .build()
            .unwrap();
        assert_eq!(c.endpoint.host, "office");
        assert_eq!(c.endpoint.port, 8100);
    }

    #[test]
    fn builder_rejects_bad_endpoint() {
        let err = ConversionConfig::builder()
            .endpoint("office")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn quality_is_not_clamped() {
        let c = ConversionConfig::builder().quality(250).build().unwrap();
        assert_eq!(c.quality, 250);
        let c = ConversionConfig::builder().quality(-1).build().unwrap();
        assert_eq!(c.quality, -1);
    }

    #[test]
    fn zero_timeouts_rejected() {
        assert!(ConversionConfig::builder()
            .call_timeout_secs(0)
            .build()
            .is_err());
        assert!(ConversionConfig::builder()
            .connect_timeout_secs(0)
            .build()
            .is_err());
    }
}
