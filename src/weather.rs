//! Weather multiplier collaborator.
//!
//! The watering duration of every dispatched plan is scaled by a factor
//! fetched from an external weather service: `GET <url>` returning
//! `{"multiplier": <float>}`. The service aggregates rain, heat and wind
//! into a single number: 0.0 means "it rained, skip watering", values
//! above 1.0 stretch durations through a heat wave.
//!
//! The collaborator is strictly advisory. Any failure (no URL configured,
//! network down, timeout, malformed body, missing field, negative value)
//! yields the neutral multiplier 1.0 and a log line. Scheduling never
//! blocks on it and never aborts because of it; the fetch runs on the
//! runner thread, off the polling loop.

/// The multiplier used whenever the service cannot be consulted.
pub const NEUTRAL_MULTIPLIER: f64 = 1.0;

/// Client for the weather multiplier endpoint.
#[derive(Debug, Clone, Default)]
pub struct WeatherClient {
    url: Option<String>,
}

impl WeatherClient {
    pub fn new(url: Option<String>) -> Self {
        Self { url }
    }

    /// Fetch the current multiplier, degrading to
    /// [`NEUTRAL_MULTIPLIER`] on any failure.
    pub fn fetch_multiplier(&self) -> f64 {
        let Some(url) = &self.url else {
            return NEUTRAL_MULTIPLIER;
        };

        match fetch(url) {
            Ok(multiplier) => multiplier,
            Err(e) => {
                log_warning!("Weather multiplier unavailable ({e:#}), using 1.0");
                NEUTRAL_MULTIPLIER
            }
        }
    }
}

fn fetch(url: &str) -> anyhow::Result<f64> {
    let mut response = ureq::get(url).call()?;
    let body = response.body_mut().read_to_string()?;

    let json: serde_json::Value = serde_json::from_str(&body)?;
    let multiplier = json
        .get("multiplier")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| anyhow::anyhow!("response has no numeric 'multiplier' field"))?;

    if multiplier < 0.0 {
        anyhow::bail!("multiplier {multiplier} is negative");
    }
    Ok(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_url_means_neutral() {
        let client = WeatherClient::new(None);
        assert_eq!(client.fetch_multiplier(), NEUTRAL_MULTIPLIER);
    }

    #[test]
    fn unreachable_service_means_neutral() {
        crate::logger::Log::set_enabled(false);
        // Discard port on loopback: connection refused immediately.
        let client = WeatherClient::new(Some("http://127.0.0.1:9/api/weather-multiplier".into()));
        assert_eq!(client.fetch_multiplier(), NEUTRAL_MULTIPLIER);
        crate::logger::Log::set_enabled(true);
    }
}
