//! Browser-driven firmware update endpoint — backed by `esp-ota`.
//!
//! Serves two pages while the network link is up:
//!
//! - `GET /`        → landing page that redirects to `/update` after 3 s
//! - `GET /update`  → minimal firmware upload form
//! - `POST /update` → streams the image into the inactive partition,
//!   then marks it bootable and restarts
//!
//! Upload progress is logged at most once per `ota_log_interval_ms`
//! (plus a final line at completion); the throttle lives in
//! [`ProgressLogger`] so it can be exercised without hardware.
//!
//! The `esp-ota` crate wraps the ESP-IDF OTA partition API, keeping
//! this module free of unsafe FFI.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::error::CommsError;

const UPDATE_PORT: u16 = 80;

/// Landing page served at `/`.
const ROOT_REDIRECT_HTML: &str = "<!DOCTYPE html><html><head>\
<meta http-equiv=\"refresh\" content=\"3; url=/update\" />\
</head><body>\
<p>You will be redirected to OTA Update interface in 3s</p>\
</body></html>";

/// Upload form served at `GET /update`.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const UPDATE_FORM_HTML: &str = "<!DOCTYPE html><html><body>\
<form method=\"POST\" action=\"/update\" enctype=\"multipart/form-data\">\
<input type=\"file\" name=\"firmware\" />\
<input type=\"submit\" value=\"Update\" />\
</form></body></html>";

// ── Progress throttle ─────────────────────────────────────────

/// Rate-limits upload progress lines to one per interval.
///
/// The first report after [`reset`](Self::reset) always logs, so short
/// uploads still produce at least one line.
pub struct ProgressLogger {
    interval_ms: u64,
    last_log_ms: Option<u64>,
}

impl ProgressLogger {
    pub const fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_log_ms: None,
        }
    }

    /// Arm for a fresh upload.
    pub fn reset(&mut self) {
        self.last_log_ms = None;
    }

    /// Report progress; returns `true` when a line was emitted.
    pub fn on_progress(&mut self, current: u32, total: u32, now_ms: u64) -> bool {
        let due = match self.last_log_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        };
        if !due {
            return false;
        }
        self.last_log_ms = Some(now_ms);
        if total > 0 {
            info!("update: {} / {} bytes", current, total);
        } else {
            info!("update: {} bytes", current);
        }
        true
    }
}

// ── Endpoint ──────────────────────────────────────────────────

/// Firmware update endpoint.
///
/// On ESP-IDF targets this owns an `EspHttpServer`; on simulation
/// targets only the lifecycle and throttle logic exist.
pub struct UpdateEndpoint {
    active: bool,
    log_interval_ms: u64,
    #[cfg(target_os = "espidf")]
    server: Option<esp_idf_svc::http::server::EspHttpServer<'static>>,
}

impl UpdateEndpoint {
    pub fn new(log_interval_ms: u64) -> Self {
        Self {
            active: false,
            log_interval_ms,
            #[cfg(target_os = "espidf")]
            server: None,
        }
    }

    /// Whether the endpoint is currently serving.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Bring the HTTP server up. Call after the network link is up.
    pub fn start(&mut self) -> Result<(), CommsError> {
        if self.active {
            return Ok(());
        }
        self.platform_start()?;
        self.active = true;
        info!("update: endpoint serving on port {}", UPDATE_PORT);
        Ok(())
    }

    /// Tear the server down. Call on network loss.
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.platform_stop();
        self.active = false;
        info!("update: endpoint stopped");
    }

    // ── Platform: ESP-IDF ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), CommsError> {
        use esp_idf_svc::http::server::{Configuration, EspHttpServer, Method};
        use esp_idf_svc::io::{Read, Write};

        let mut server = EspHttpServer::new(&Configuration {
            http_port: UPDATE_PORT,
            ..Default::default()
        })
        .map_err(|e| {
            log::error!("update(espidf): server start failed: {}", e);
            CommsError::EndpointStartFailed
        })?;

        server
            .fn_handler("/", Method::Get, |req| {
                let mut resp =
                    req.into_response(200, Some("OK"), &[("Content-Type", "text/html")])?;
                resp.write_all(ROOT_REDIRECT_HTML.as_bytes())?;
                Ok::<(), esp_idf_svc::io::EspIOError>(())
            })
            .map_err(|_| CommsError::EndpointStartFailed)?;

        server
            .fn_handler("/update", Method::Get, |req| {
                let mut resp =
                    req.into_response(200, Some("OK"), &[("Content-Type", "text/html")])?;
                resp.write_all(UPDATE_FORM_HTML.as_bytes())?;
                Ok::<(), esp_idf_svc::io::EspIOError>(())
            })
            .map_err(|_| CommsError::EndpointStartFailed)?;

        let log_interval_ms = self.log_interval_ms;
        server
            .fn_handler("/update", Method::Post, move |mut req| {
                let total = req
                    .header("Content-Length")
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(0);

                let mut progress = ProgressLogger::new(log_interval_ms);
                progress.reset();
                info!("update: upload started ({} bytes declared)", total);

                let mut update = match esp_ota::OtaUpdate::begin() {
                    Ok(u) => u,
                    Err(e) => {
                        warn!("update: begin failed: {:?}", e);
                        req.into_status_response(500)?;
                        return Ok(());
                    }
                };

                let mut buf = [0u8; 4096];
                let mut written: u32 = 0;
                loop {
                    let n = req.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    if let Err(e) = update.write(&buf[..n]) {
                        warn!("update: write failed at {}: {:?}", written, e);
                        req.into_status_response(500)?;
                        return Ok(());
                    }
                    written += n as u32;
                    let now_ms =
                        (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000) as u64;
                    progress.on_progress(written, total, now_ms);
                }
                info!("update: upload complete ({} bytes)", written);

                let mut completed = match update.finalize() {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("update: finalize failed: {:?}", e);
                        req.into_status_response(500)?;
                        return Ok(());
                    }
                };
                if let Err(e) = completed.set_as_boot_partition() {
                    warn!("update: set boot partition failed: {:?}", e);
                    req.into_status_response(500)?;
                    return Ok(());
                }

                let mut resp =
                    req.into_response(200, Some("OK"), &[("Content-Type", "text/plain")])?;
                resp.write_all(b"OK, rebooting")?;
                drop(resp);

                info!("update: rebooting into new firmware");
                esp_ota::restart();
            })
            .map_err(|_| CommsError::EndpointStartFailed)?;

        self.server = Some(server);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        // Dropping the server unbinds the port.
        self.server = None;
    }

    // ── Platform: simulation ──────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), CommsError> {
        info!("update(sim): endpoint registered");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("update(sim): endpoint unregistered");
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running firmware valid so the rollback watchdog does not
/// revert to the previous image.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("update: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("update: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    info!("update rollback check (simulation): skipped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_progress_report_always_logs() {
        let mut p = ProgressLogger::new(1_000);
        assert!(p.on_progress(10, 100, 5));
    }

    #[test]
    fn reports_inside_interval_are_suppressed() {
        let mut p = ProgressLogger::new(1_000);
        assert!(p.on_progress(10, 100, 0));
        assert!(!p.on_progress(20, 100, 400));
        assert!(!p.on_progress(30, 100, 999));
        assert!(p.on_progress(40, 100, 1_000));
    }

    #[test]
    fn reset_rearms_the_throttle() {
        let mut p = ProgressLogger::new(1_000);
        assert!(p.on_progress(10, 100, 0));
        assert!(!p.on_progress(20, 100, 100));
        p.reset();
        assert!(p.on_progress(5, 100, 150));
    }

    #[test]
    fn unknown_total_still_logs() {
        let mut p = ProgressLogger::new(1_000);
        assert!(p.on_progress(4096, 0, 0));
    }

    #[test]
    fn start_stop_lifecycle() {
        let mut ep = UpdateEndpoint::new(1_000);
        assert!(!ep.is_active());
        ep.start().unwrap();
        assert!(ep.is_active());
        ep.start().unwrap(); // idempotent
        ep.stop();
        assert!(!ep.is_active());
        ep.stop(); // idempotent
    }

    #[test]
    fn landing_page_redirects_to_update() {
        assert!(ROOT_REDIRECT_HTML.contains("url=/update"));
        assert!(ROOT_REDIRECT_HTML.contains("redirected to OTA Update interface in 3s"));
    }
}
