//! Static points of interest consumed by the simulation: hospitals,
//! origin neighborhoods, smart signal waypoints and monitored street
//! segments. The catalogue is plain data handed to [`Simulation`] at
//! construction; a built-in Sorocaba dataset is provided for demos and
//! tests.
//!
//! [`Simulation`]: crate::Simulation

use crate::math::{haversine_km, GeoPoint};
use once_cell::sync::Lazy;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Classification of a hospital.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HospitalTier {
    Public,
    Private,
    UrgentCare,
}

/// How much emergency intake a hospital can absorb.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EmergencyCapacity {
    Low,
    Medium,
    High,
}

/// A destination hospital.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hospital {
    pub id: String,
    pub name: String,
    pub tier: HospitalTier,
    pub coordinates: GeoPoint,
    pub address: String,
    pub phone: String,
    pub beds: u32,
    pub emergency_capacity: EmergencyCapacity,
}

/// A named origin area.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Neighborhood {
    pub name: String,
    pub coordinates: GeoPoint,
}

/// A traffic-signal intersection tracked for clearance events.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalWaypoint {
    pub id: String,
    pub coordinates: GeoPoint,
    pub intersection: String,
    pub connected_to_system: bool,
    pub average_wait_secs: u32,
}

/// The fixed identity of a monitored street segment. Congestion and
/// incidents are recomputed for it on every traffic snapshot.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentSite {
    pub id: String,
    pub name: String,
    pub coordinates: GeoPoint,
    pub base_speed_kmh: f64,
}

/// The full set of static points of interest for one deployment area.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Catalogue {
    pub hospitals: Vec<Hospital>,
    pub neighborhoods: Vec<Neighborhood>,
    pub signals: Vec<SignalWaypoint>,
    pub segments: Vec<SegmentSite>,
}

impl Catalogue {
    /// Looks up a hospital by its identifier.
    pub fn hospital(&self, id: &str) -> Option<&Hospital> {
        self.hospitals.iter().find(|h| h.id == id)
    }

    /// Looks up an origin neighborhood by name.
    pub fn neighborhood(&self, name: &str) -> Option<&Neighborhood> {
        self.neighborhoods.iter().find(|n| n.name == name)
    }

    /// Finds the hospital nearest to `position`, optionally requiring a
    /// minimum emergency capacity. Returns `None` when no hospital
    /// satisfies the filter.
    pub fn nearest_hospital(
        &self,
        position: GeoPoint,
        min_capacity: Option<EmergencyCapacity>,
    ) -> Option<&Hospital> {
        self.hospitals
            .iter()
            .filter(|h| min_capacity.map_or(true, |min| h.emergency_capacity >= min))
            .min_by(|a, b| {
                let da = haversine_km(position, a.coordinates);
                let db = haversine_km(position, b.coordinates);
                da.partial_cmp(&db).expect("distances are finite")
            })
    }

    /// The built-in Sorocaba dataset.
    pub fn sorocaba() -> &'static Catalogue {
        &SOROCABA
    }
}

fn hospital(
    id: &str,
    name: &str,
    tier: HospitalTier,
    lat: f64,
    lon: f64,
    address: &str,
    phone: &str,
    beds: u32,
    emergency_capacity: EmergencyCapacity,
) -> Hospital {
    Hospital {
        id: id.into(),
        name: name.into(),
        tier,
        coordinates: GeoPoint::new(lat, lon),
        address: address.into(),
        phone: phone.into(),
        beds,
        emergency_capacity,
    }
}

fn signal(id: &str, lat: f64, lon: f64, intersection: &str, average_wait_secs: u32) -> SignalWaypoint {
    SignalWaypoint {
        id: id.into(),
        coordinates: GeoPoint::new(lat, lon),
        intersection: intersection.into(),
        connected_to_system: true,
        average_wait_secs,
    }
}

fn neighborhood(name: &str, lat: f64, lon: f64) -> Neighborhood {
    Neighborhood {
        name: name.into(),
        coordinates: GeoPoint::new(lat, lon),
    }
}

fn segment(id: &str, name: &str, lat: f64, lon: f64, base_speed_kmh: f64) -> SegmentSite {
    SegmentSite {
        id: id.into(),
        name: name.into(),
        coordinates: GeoPoint::new(lat, lon),
        base_speed_kmh,
    }
}

static SOROCABA: Lazy<Catalogue> = Lazy::new(|| {
    use EmergencyCapacity::*;
    use HospitalTier::*;
    Catalogue {
        hospitals: vec![
            hospital(
                "gpaci",
                "Hospital GPACI",
                Private,
                -23.4876,
                -47.4291,
                "R. Aparecida, 249 - Centro",
                "(15) 3211-1500",
                120,
                High,
            ),
            hospital(
                "santa-lucinda",
                "Hospital Santa Lucinda",
                Private,
                -23.4952,
                -47.4583,
                "R. Voluntários de São Paulo, 3780",
                "(15) 2101-9000",
                180,
                High,
            ),
            hospital(
                "modelo",
                "Hospital Modelo",
                Public,
                -23.5012,
                -47.4478,
                "Av. Comendador Pereira Inácio, 564",
                "(15) 3233-3000",
                200,
                High,
            ),
            hospital(
                "upa-zona-norte",
                "UPA Zona Norte",
                UrgentCare,
                -23.4723,
                -47.4612,
                "Av. São Paulo, 1500 - Jd. Santa Rosália",
                "(15) 3229-8000",
                40,
                Medium,
            ),
            hospital(
                "upa-zona-leste",
                "UPA Zona Leste",
                UrgentCare,
                -23.5089,
                -47.4198,
                "R. Cel. Nogueira Padilha, 1350",
                "(15) 3229-8100",
                35,
                Medium,
            ),
            hospital(
                "saude-sorocabana",
                "Hospital Saúde Sorocabana",
                Private,
                -23.4998,
                -47.4521,
                "R. Dr. Álvaro Soares, 91",
                "(15) 3332-4400",
                90,
                Medium,
            ),
            hospital(
                "evangelico",
                "Hospital Evangélico",
                Private,
                -23.4934,
                -47.4467,
                "R. Dr. Souza Pereira, 100",
                "(15) 3227-8000",
                85,
                Medium,
            ),
            hospital(
                "regional",
                "Hospital Regional de Sorocaba",
                Public,
                -23.5156,
                -47.4389,
                "Av. Comendador Pereira Inácio, 900",
                "(15) 3238-8000",
                300,
                High,
            ),
        ],
        neighborhoods: vec![
            neighborhood("Centro", -23.4958, -47.4524),
            neighborhood("Jardim Vera Cruz", -23.5180, -47.4680),
            neighborhood("Vila Hortência", -23.4876, -47.4623),
            neighborhood("Jardim Santa Rosália", -23.4712, -47.4589),
            neighborhood("Jardim Gonçalves", -23.5012, -47.4398),
            neighborhood("Jardim América", -23.4834, -47.4312),
            neighborhood("Vila Barão", -23.5089, -47.4567),
            neighborhood("Jardim Faculdade", -23.4756, -47.4478),
            neighborhood("Jardim Ipanema", -23.5034, -47.4512),
            neighborhood("Jardim Simus", -23.5145, -47.4234),
        ],
        signals: vec![
            signal("stl-1", -23.4958, -47.4525, "Av. Dom Aguirre x R. XV de Novembro", 45),
            signal("stl-2", -23.4912, -47.4478, "Av. General Carneiro x R. Padre Luiz", 38),
            signal("stl-3", -23.5001, -47.4498, "Av. Ipanema x R. São Paulo", 52),
            signal("stl-4", -23.4845, -47.4392, "Av. Antônio Carlos Comitre x R. Itapeva", 40),
            signal("stl-5", -23.5078, -47.4334, "Av. Independência x R. Cel. Nogueira Padilha", 48),
            signal("stl-6", -23.4789, -47.4556, "Av. São Paulo x R. Comendador Oetterer", 35),
            signal("stl-7", -23.5123, -47.4567, "Av. Washington Luiz x R. Barão de Tatuí", 42),
            signal("stl-8", -23.4867, -47.4678, "Av. Pereira da Silva x R. Teodoro Kaiser", 50),
        ],
        segments: vec![
            segment("av-dom-aguirre", "Av. Dom Aguirre", -23.4958, -47.4525, 50.0),
            segment("av-general-carneiro", "Av. General Carneiro", -23.4912, -47.4478, 45.0),
            segment("av-ipanema", "Av. Ipanema", -23.5001, -47.4498, 50.0),
            segment(
                "av-antonio-carlos-comitre",
                "Av. Antônio Carlos Comitre",
                -23.4845,
                -47.4392,
                60.0,
            ),
            segment("av-independencia", "Av. Independência", -23.5078, -47.4334, 55.0),
            segment("av-sao-paulo", "Av. São Paulo", -23.4789, -47.4556, 45.0),
            segment("av-washington-luiz", "Av. Washington Luiz", -23.5123, -47.4567, 50.0),
            segment("av-pereira-da-silva", "Av. Pereira da Silva", -23.4867, -47.4678, 45.0),
            segment("r-xv-novembro", "R. XV de Novembro (Centro)", -23.4965, -47.4512, 30.0),
            segment("av-itavuvu", "Av. Itavuvu", -23.4734, -47.4423, 55.0),
        ],
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_id_and_name() {
        let cat = Catalogue::sorocaba();
        assert_eq!(cat.hospital("regional").unwrap().beds, 300);
        assert!(cat.hospital("nowhere").is_none());
        assert!(cat.neighborhood("Centro").is_some());
        assert!(cat.neighborhood("Atlantis").is_none());
    }

    #[test]
    fn nearest_hospital_respects_capacity_filter() {
        let cat = Catalogue::sorocaba();
        let centre = GeoPoint::new(-23.4958, -47.4524);
        let any = cat.nearest_hospital(centre, None).unwrap();
        let high = cat
            .nearest_hospital(centre, Some(EmergencyCapacity::High))
            .unwrap();
        assert_eq!(high.emergency_capacity, EmergencyCapacity::High);
        // The unfiltered pick is never farther than the filtered one.
        let da = haversine_km(centre, any.coordinates);
        let dh = haversine_km(centre, high.coordinates);
        assert!(da <= dh);
    }

    #[test]
    fn dataset_shape() {
        let cat = Catalogue::sorocaba();
        assert_eq!(cat.hospitals.len(), 8);
        assert_eq!(cat.signals.len(), 8);
        assert_eq!(cat.neighborhoods.len(), 10);
        assert_eq!(cat.segments.len(), 10);
    }
}
