//! Deterministic historical records shared by pipeline, io and report tests.

use std::collections::BTreeMap;

use crate::data::MemorySource;
use crate::domain::{HistoricalSample, ProjectAttributes};

pub const COST_COLUMNS: [&str; 25] = [
    "transporte",
    "informacion_geografica",
    "trazado_diseno_geometrico",
    "seguridad_vial",
    "sistemas_inteligentes",
    "geologia",
    "hidrogeologia",
    "suelos",
    "taludes",
    "pavimento",
    "socavacion",
    "estructuras",
    "tuneles",
    "urbanismo_paisajismo",
    "predial",
    "impacto_ambiental",
    "cantidades",
    "evaluacion_socioeconomica",
    "otros_manejo_redes",
    "direccion_coordinacion",
    "topografia",
    "hidrologia_hidraulica",
    "ambiental_social",
    "costos_presupuestos",
    "socioeconomica",
];

/// Length-driven categories and their cost per km^0.9.
const LENGTH_RATES: [(&str, f64); 17] = [
    ("transporte", 40_000.0),
    ("informacion_geografica", 15_000.0),
    ("trazado_diseno_geometrico", 60_000.0),
    ("seguridad_vial", 12_000.0),
    ("sistemas_inteligentes", 8_000.0),
    ("taludes", 30_000.0),
    ("pavimento", 55_000.0),
    ("socavacion", 18_000.0),
    ("predial", 25_000.0),
    ("impacto_ambiental", 20_000.0),
    ("evaluacion_socioeconomica", 9_000.0),
    ("otros_manejo_redes", 7_000.0),
    ("topografia", 22_000.0),
    ("hidrologia_hidraulica", 16_000.0),
    ("ambiental_social", 19_000.0),
    ("costos_presupuestos", 6_000.0),
    ("socioeconomica", 5_000.0),
];

const SCOPES: [&str; 3] = ["Mejoramiento", "Nuevo", "Rehabilitacion"];
const SCOPE_FACTORS: [f64; 3] = [1.0, 1.3, 0.8];
const N_PROJECTS: usize = 36;

/// Deterministic value in `[-1, 1]`.
fn noise(i: usize) -> f64 {
    ((i * 37) % 11) as f64 / 5.0 - 1.0
}

/// 36 projects (every third with two units), project-level costs repeated on each unit.
pub fn fixture_records() -> Vec<HistoricalSample> {
    let mut out = Vec::new();
    for i in 0..N_PROJECTS {
        let units = if i % 3 == 0 { 2 } else { 1 };
        let lengths: Vec<f64> = (0..units).map(|u| 3.0 + ((i * 7 + u * 5) % 23) as f64 * 0.8).collect();
        let total: f64 = lengths.iter().sum();
        let e = 1.0 + 0.05 * noise(i);
        let by_length = |rate: f64| rate * total.powf(0.9) * e * SCOPE_FACTORS[i % 3];

        let bridges = if i % 2 == 0 { 1.0 + (i % 4) as f64 } else { 0.0 };
        let deck = if bridges > 0.0 { bridges * 120.0 + i as f64 } else { 0.0 };
        let footbridges = if i % 3 == 0 { 1.0 + (i % 2) as f64 } else { 0.0 };
        let tunnels = if i % 9 == 0 { 1.0 } else { 0.0 };
        let tunnel_km = if tunnels > 0.0 { 0.4 + i as f64 / 30.0 } else { 0.0 };

        let mut costs: BTreeMap<String, f64> =
            LENGTH_RATES.iter().map(|(c, rate)| (c.to_string(), by_length(*rate))).collect();
        let geology = by_length(14_000.0);
        costs.insert("geologia".into(), geology);
        costs.insert("hidrogeologia".into(), 0.1 * geology);
        costs.insert("suelos".into(), if deck > 0.0 { (5_000.0 + 30.0 * deck) * e } else { 0.0 });
        costs.insert("estructuras".into(), 25_000.0 * bridges * e);
        costs.insert("tuneles".into(), 150_000.0 * tunnel_km * e);
        costs.insert("urbanismo_paisajismo".into(), 9_000.0 * footbridges * e);
        let quantities = if bridges > 0.0 || footbridges > 0.0 {
            (4_000.0 * bridges + 10.0 * deck + 2_500.0 * footbridges + 1_000.0) * e
        } else {
            0.0
        };
        costs.insert("cantidades".into(), quantities);
        let design = costs["trazado_diseno_geometrico"] + costs["taludes"] + costs["socavacion"];
        costs.insert("direccion_coordinacion".into(), 0.12 * design * (1.0 + 0.03 * noise(i + 1)));

        for (u, len) in lengths.iter().enumerate() {
            let first = u == 0;
            out.push(HistoricalSample {
                project_code: format!("P{i:03}"),
                unit: format!("{}", u + 1),
                start_year: Some(2015 + (i % 8) as i32),
                scope: SCOPES[i % 3].to_string(),
                attributes: ProjectAttributes {
                    longitud_km: *len,
                    puentes_vehiculares_und: if first { bridges } else { 0.0 },
                    puentes_vehiculares_mt2: if first { deck } else { 0.0 },
                    puentes_peatonales_und: if first { footbridges } else { 0.0 },
                    puentes_peatonales_mt2: if first { footbridges * 40.0 } else { 0.0 },
                    tuneles_und: if first { tunnels } else { 0.0 },
                    tuneles_km: if first { tunnel_km } else { 0.0 },
                },
                costs: costs.clone(),
            });
        }
    }
    out
}

pub fn fixture_source() -> MemorySource {
    MemorySource::new(&COST_COLUMNS, fixture_records())
}
