//! Device, locale, and sensor emulation pass-throughs.

use serde_json::{json, Value};
use tracing::warn;

use crate::error::Result;
use crate::session::CdpSession;

impl CdpSession {
    pub async fn set_device_metrics(
        &self,
        width: u32,
        height: u32,
        device_scale_factor: f64,
        mobile: bool,
    ) -> Result<()> {
        self.send(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": device_scale_factor,
                "mobile": mobile,
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn clear_device_metrics(&self) -> Result<()> {
        self.send("Emulation.clearDeviceMetricsOverride", json!({}))
            .await?;
        Ok(())
    }

    pub async fn set_touch_emulation(&self, enabled: bool) -> Result<()> {
        self.send(
            "Emulation.setTouchEmulationEnabled",
            json!({ "enabled": enabled }),
        )
        .await?;
        Ok(())
    }

    pub async fn set_user_agent(
        &self,
        user_agent: &str,
        accept_language: Option<&str>,
        platform: Option<&str>,
    ) -> Result<()> {
        let mut params = json!({ "userAgent": user_agent });
        if let Some(accept_language) = accept_language {
            params["acceptLanguage"] = json!(accept_language);
        }
        if let Some(platform) = platform {
            params["platform"] = json!(platform);
        }
        self.send("Emulation.setUserAgentOverride", params).await?;
        Ok(())
    }

    pub async fn set_timezone(&self, timezone_id: &str) -> Result<()> {
        self.send(
            "Emulation.setTimezoneOverride",
            json!({ "timezoneId": timezone_id }),
        )
        .await?;
        Ok(())
    }

    /// Geolocation override. The permission grant is best-effort: older
    /// browsers without `Browser.grantPermissions` still get the override.
    pub async fn set_geolocation(
        &self,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
    ) -> Result<()> {
        if let Err(err) = self
            .send(
                "Browser.grantPermissions",
                json!({ "permissions": ["geolocation"] }),
            )
            .await
        {
            warn!(target: "cdp-session", ?err, "geolocation permission grant failed; continuing");
        }

        let mut params = json!({ "latitude": latitude, "longitude": longitude });
        params["accuracy"] = json!(accuracy.unwrap_or(1.0));
        self.send("Emulation.setGeolocationOverride", params).await?;
        Ok(())
    }

    pub async fn clear_geolocation(&self) -> Result<()> {
        self.send("Emulation.clearGeolocationOverride", json!({}))
            .await?;
        Ok(())
    }

    /// Viewport and content dimensions, straight from the browser.
    pub async fn layout_metrics(&self) -> Result<Value> {
        self.send("Page.getLayoutMetrics", json!({})).await
    }
}
