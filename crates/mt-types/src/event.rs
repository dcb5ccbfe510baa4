use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius used for epicentral distances
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Event hypocenter and origin time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub latitude: f64,
    pub longitude: f64,
    pub depth_in_m: f64,
    pub time: DateTime<Utc>,
}

impl Origin {
    pub fn new(latitude: f64, longitude: f64, depth_in_m: f64, time: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            depth_in_m,
            time,
        }
    }

    /// Same epicenter and time, different depth.
    pub fn at_depth(&self, depth_in_m: f64) -> Self {
        Self {
            depth_in_m,
            ..self.clone()
        }
    }

    /// Great-circle distance (m) and azimuth (deg clockwise from north) to a point.
    pub fn distance_azimuth(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        let (lat1, lon1) = (self.latitude.to_radians(), self.longitude.to_radians());
        let (lat2, lon2) = (latitude.to_radians(), longitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = lon2 - lon1;

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let distance = 2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt());

        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        let azimuth = y.atan2(x).to_degrees().rem_euclid(360.0);

        (distance, azimuth)
    }
}

/// Per-receiver metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Epicentral distance, filled in once the origin is known.
    #[serde(default)]
    pub distance_in_m: f64,
    #[serde(default)]
    pub azimuth: f64,
}

impl Station {
    pub fn new(network: &str, station: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: String::new(),
            latitude,
            longitude,
            distance_in_m: 0.0,
            azimuth: 0.0,
        }
    }

    /// `NET.STA.LOC` identifier, `NET.STA` when the location code is empty.
    pub fn id(&self) -> String {
        if self.location.is_empty() {
            format!("{}.{}", self.network, self.station)
        } else {
            format!("{}.{}.{}", self.network, self.station, self.location)
        }
    }

    /// Fill in distance and azimuth relative to `origin`.
    pub fn locate(&mut self, origin: &Origin) {
        let (distance, azimuth) = origin.distance_azimuth(self.latitude, self.longitude);
        self.distance_in_m = distance;
        self.azimuth = azimuth;
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
