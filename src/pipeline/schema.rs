//! Per-phase stage declarations.
//!
//! Every phase is an explicit list of stages. A stage names its target
//! category, how its features and target are modeled, how its training frame
//! is prepared, which other categories it depends on, and the physical
//! attributes whose absence means the category is not incurred.
//!
//! The dependency graph is validated once (duplicates, unknown dependencies,
//! category predictors missing from the dependency set, cycles) and executed in
//! topological order with ties broken by declaration order.

use serde::{Deserialize, Serialize};

use crate::data::{Aggregation, HistoricalTable, Preparation};
use crate::domain::{Phase, TargetTransform, is_attribute};
use crate::error::AppError;
use crate::fit::{Augmentation, RegressorSpec, StageSpec};

/// Leave-one-out at every sample size.
pub const ALWAYS_LOO: usize = usize::MAX;

/// Bridge project excluded from the bridge-driven categories (atypical scope).
const ATYPICAL_BRIDGE_PROJECT: &str = "0654801";

/// Synthetic rows added to each tunnel training set.
const TUNNEL_SYNTHETIC_ROWS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDecl {
    pub stage: StageSpec,
    pub depends_on: Vec<String>,
    pub preparation: Preparation,
    /// When every gate attribute is zero the stage predicts exactly zero.
    pub gates: Vec<String>,
}

impl StageDecl {
    fn new(stage: StageSpec) -> Self {
        Self {
            stage,
            depends_on: Vec::new(),
            preparation: Preparation::PerUnit,
            gates: Vec::new(),
        }
    }

    fn depends_on(mut self, categories: &[&str]) -> Self {
        self.depends_on = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    fn per_project(mut self, agg: Aggregation) -> Self {
        self.preparation = Preparation::PerProject(agg);
        self
    }

    fn gated_on(mut self, attributes: &[&str]) -> Self {
        self.gates = attributes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn category(&self) -> &str {
        &self.stage.category
    }

    /// Predictors followed by the target.
    pub fn columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.stage.predictors().iter().map(String::as_str).collect();
        out.push(self.category());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSchema {
    pub phase: Phase,
    pub stages: Vec<StageDecl>,
}

impl PhaseSchema {
    pub fn for_phase(phase: Phase) -> Self {
        let stages = match phase {
            Phase::II => phase_ii(),
            Phase::III => phase_iii(),
        };
        Self { phase, stages }
    }

    pub fn categories(&self) -> Vec<&str> {
        self.stages.iter().map(StageDecl::category).collect()
    }

    pub fn stage(&self, category: &str) -> Option<&StageDecl> {
        self.stages.iter().find(|s| s.category() == category)
    }

    /// Validate the dependency graph and return stages in execution order.
    pub fn execution_order(&self) -> Result<Vec<&StageDecl>, AppError> {
        let n = self.stages.len();
        for (i, decl) in self.stages.iter().enumerate() {
            let cat = decl.category();
            if self.stages[..i].iter().any(|s| s.category() == cat) {
                return Err(config_error(self.phase, format!("category '{cat}' is declared twice")));
            }
            for dep in &decl.depends_on {
                if self.stage(dep).is_none() {
                    return Err(config_error(
                        self.phase,
                        format!("'{cat}' depends on undeclared category '{dep}'"),
                    ));
                }
                if dep == cat {
                    return Err(config_error(self.phase, format!("'{cat}' depends on itself")));
                }
            }
            for p in decl.stage.predictors() {
                if !is_attribute(p) && !decl.depends_on.contains(p) {
                    return Err(config_error(
                        self.phase,
                        format!("'{cat}' uses category '{p}' as a predictor without declaring the dependency"),
                    ));
                }
            }
        }

        let mut done = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while order.len() < n {
            let next = (0..n).find(|&i| {
                !done[i]
                    && self.stages[i]
                        .depends_on
                        .iter()
                        .all(|d| self.stages.iter().position(|s| s.category() == d).is_some_and(|j| done[j]))
            });
            match next {
                Some(i) => {
                    done[i] = true;
                    order.push(&self.stages[i]);
                }
                None => {
                    let stuck: Vec<&str> = (0..n).filter(|&i| !done[i]).map(|i| self.stages[i].category()).collect();
                    return Err(config_error(
                        self.phase,
                        format!("dependency cycle among: {}", stuck.join(", ")),
                    ));
                }
            }
        }
        Ok(order)
    }

    /// Check that every column a stage reads exists in the table.
    pub fn validate_columns(&self, table: &HistoricalTable) -> Result<(), AppError> {
        let mut missing: Vec<String> = Vec::new();
        for decl in &self.stages {
            let mut cols = decl.columns();
            if let Preparation::PerProject(agg) = &decl.preparation {
                cols.extend(agg.columns());
            }
            cols.extend(decl.gates.iter().map(String::as_str));
            for c in cols {
                if !table.has_column(c) && !missing.iter().any(|m| m == c) {
                    missing.push(c.to_string());
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::new(
                2,
                format!(
                    "Historical table is missing columns required by phase {}: {}",
                    self.phase,
                    missing.join(", ")
                ),
            ))
        }
    }
}

fn config_error(phase: Phase, detail: String) -> AppError {
    AppError::new(2, format!("Invalid stage schema for phase {phase}: {detail}."))
}

/// Length-driven category: kernel ridge on length and `log1p(length)` with scope indicators.
fn length_stage(category: &str) -> StageDecl {
    StageDecl::new(
        StageSpec::new(category, &["longitud_km"])
            .log_features(&["longitud_km"])
            .with_scope()
            .transform(TargetTransform::Log1p)
            .regressor(RegressorSpec::kernel_ridge_default()),
    )
}

/// Category predicted only from other categories' values (no raw project attributes).
fn derived_stage(category: &str, from: &[&str]) -> StageDecl {
    StageDecl::new(
        StageSpec::new(category, from)
            .log_features(from)
            .transform(TargetTransform::Log1p)
            .regressor(RegressorSpec::kernel_ridge_default()),
    )
    .depends_on(from)
}

fn soils_stage() -> StageDecl {
    StageDecl::new(
        StageSpec::new("suelos", &["puentes_vehiculares_mt2"])
            .transform(TargetTransform::Log)
            .loo_below(ALWAYS_LOO),
    )
    .per_project(
        Aggregation::default()
            .require_nonzero(&["puentes_vehiculares_mt2"])
            .exclude(&[ATYPICAL_BRIDGE_PROJECT]),
    )
    .gated_on(&["puentes_vehiculares_mt2"])
}

fn structures_stage() -> StageDecl {
    StageDecl::new(StageSpec::new("estructuras", &["puentes_vehiculares_und"]).loo_below(ALWAYS_LOO))
        .per_project(
            Aggregation::default()
                .require_nonzero(&["puentes_vehiculares_und"])
                .exclude(&[ATYPICAL_BRIDGE_PROJECT]),
        )
        .gated_on(&["puentes_vehiculares_und"])
}

fn tunnels_stage() -> StageDecl {
    StageDecl::new(
        StageSpec::new("tuneles", &["tuneles_und", "tuneles_km"])
            .log_features(&["tuneles_und", "tuneles_km"])
            .transform(TargetTransform::Log1p)
            .loo_below(ALWAYS_LOO)
            .augment(Augmentation::new(TUNNEL_SYNTHETIC_ROWS, &[0.6, 0.4])),
    )
    .gated_on(&["tuneles_und", "tuneles_km"])
}

fn phase_iii() -> Vec<StageDecl> {
    const DESIGN_INPUTS: [&str; 3] = ["trazado_diseno_geometrico", "taludes", "socavacion"];
    vec![
        length_stage("transporte"),
        length_stage("informacion_geografica"),
        length_stage("trazado_diseno_geometrico"),
        length_stage("seguridad_vial"),
        length_stage("sistemas_inteligentes"),
        StageDecl::new(
            StageSpec::new("geologia", &DESIGN_INPUTS)
                .transform(TargetTransform::Log1p)
                .loo_below(ALWAYS_LOO),
        )
        .depends_on(&DESIGN_INPUTS)
        .per_project(
            Aggregation::default()
                .merge("geologia", &["geologia", "hidrogeologia"])
                .require_nonzero(&["geologia", "puentes_vehiculares_mt2"]),
        ),
        soils_stage(),
        length_stage("taludes"),
        length_stage("pavimento"),
        length_stage("socavacion"),
        structures_stage(),
        tunnels_stage(),
        StageDecl::new(StageSpec::new("urbanismo_paisajismo", &["puentes_peatonales_und"]).loo_below(ALWAYS_LOO))
            .per_project(Aggregation::default().require_nonzero(&["puentes_peatonales_und"]))
            .gated_on(&["puentes_peatonales_und"]),
        length_stage("predial"),
        length_stage("impacto_ambiental"),
        StageDecl::new(
            StageSpec::new(
                "cantidades",
                &["puentes_vehiculares_und", "puentes_vehiculares_mt2", "puentes_peatonales_und"],
            )
            .regressor(RegressorSpec::ridge_default())
            .loo_below(ALWAYS_LOO),
        )
        .per_project(Aggregation::default())
        .gated_on(&["puentes_vehiculares_und", "puentes_vehiculares_mt2", "puentes_peatonales_und"]),
        length_stage("evaluacion_socioeconomica"),
        length_stage("otros_manejo_redes"),
        derived_stage("direccion_coordinacion", &DESIGN_INPUTS),
    ]
}

fn phase_ii() -> Vec<StageDecl> {
    vec![
        length_stage("transporte"),
        length_stage("topografia"),
        length_stage("geologia"),
        length_stage("taludes"),
        length_stage("hidrologia_hidraulica"),
        structures_stage(),
        tunnels_stage(),
        length_stage("pavimento"),
        length_stage("predial"),
        length_stage("ambiental_social"),
        length_stage("costos_presupuestos"),
        length_stage("socioeconomica"),
        length_stage("direccion_coordinacion"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_iii_orders_dependents_after_prerequisites() {
        let schema = PhaseSchema::for_phase(Phase::III);
        let order: Vec<&str> = schema.execution_order().unwrap().iter().map(|s| s.category()).collect();
        assert_eq!(order.len(), schema.stages.len());
        let pos = |c: &str| order.iter().position(|o| *o == c).unwrap();
        for dep in ["trazado_diseno_geometrico", "taludes", "socavacion"] {
            assert!(pos(dep) < pos("geologia"));
            assert!(pos(dep) < pos("direccion_coordinacion"));
        }
        // Independent stages keep declaration order.
        assert_eq!(&order[..3], &["transporte", "informacion_geografica", "trazado_diseno_geometrico"]);
    }

    #[test]
    fn phase_ii_has_no_dependencies() {
        let schema = PhaseSchema::for_phase(Phase::II);
        let order: Vec<&str> = schema.execution_order().unwrap().iter().map(|s| s.category()).collect();
        assert_eq!(order, schema.categories());
    }

    #[test]
    fn cycles_are_rejected() {
        let schema = PhaseSchema {
            phase: Phase::III,
            stages: vec![derived_stage("a", &["b"]), derived_stage("b", &["a"])],
        };
        let err = schema.execution_order().unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("cycle"));
    }

    #[test]
    fn undeclared_category_predictor_is_rejected() {
        let mut decl = derived_stage("a", &["b"]);
        decl.depends_on.clear();
        let schema = PhaseSchema {
            phase: Phase::II,
            stages: vec![length_stage("b"), decl],
        };
        assert!(schema.execution_order().unwrap_err().message().contains("without declaring"));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let schema = PhaseSchema {
            phase: Phase::II,
            stages: vec![derived_stage("a", &["missing"])],
        };
        assert!(schema.execution_order().unwrap_err().message().contains("undeclared"));
    }

    #[test]
    fn missing_table_columns_are_listed() {
        let table = HistoricalTable::new(vec!["transporte".into()], Vec::new());
        let err = PhaseSchema::for_phase(Phase::II).validate_columns(&table).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("topografia"));
        assert!(!err.message().contains("transporte,"));
    }
}
