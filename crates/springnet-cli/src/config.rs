//! TOML-deserialized run configuration: network input, output paths,
//! protocol/integrator parameters, and save-point schedules.

use serde::Deserialize;
use springnet_scheduler::{
    AdaptiveParams, Fire2Params, ItpParams, MinimizerParams, QuasiStaticConfig, SavePointConfig,
    SavePointSchedule,
};
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub save_points: SavePointConfigToml,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    pub input: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    pub time_series_csv: PathBuf,
    pub bond_events_csv: PathBuf,
    pub dump_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeformAxisKind {
    Shear,
    Elongation,
}

impl Default for DeformAxisKind {
    fn default() -> Self {
        Self::Shear
    }
}

#[derive(Debug, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub axis: DeformAxisKind,
    #[serde(default = "default_max_strain")]
    pub max_strain: f64,
    #[serde(default = "default_root_tol")]
    pub root_tol: f64,
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    #[serde(default)]
    pub error_on_not_single: bool,
    #[serde(default = "default_zeta")]
    pub zeta: f64,
    #[serde(default)]
    pub adaptive: AdaptiveParamsToml,
    #[serde(default)]
    pub minimizer: MinimizerParamsToml,
    #[serde(default)]
    pub fire: Fire2ParamsToml,
    #[serde(default)]
    pub itp: ItpParamsToml,
}

fn default_max_strain() -> f64 {
    0.1
}
fn default_root_tol() -> f64 {
    1e-8
}
fn default_max_step() -> f64 {
    1e-3
}
fn default_zeta() -> f64 {
    1.0
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            axis: DeformAxisKind::default(),
            max_strain: default_max_strain(),
            root_tol: default_root_tol(),
            max_step: default_max_step(),
            error_on_not_single: false,
            zeta: default_zeta(),
            adaptive: AdaptiveParamsToml::default(),
            minimizer: MinimizerParamsToml::default(),
            fire: Fire2ParamsToml::default(),
            itp: ItpParamsToml::default(),
        }
    }
}

impl ProtocolConfig {
    #[must_use]
    pub fn to_quasistatic_config(&self) -> QuasiStaticConfig {
        QuasiStaticConfig {
            max_strain: self.max_strain,
            root_tol: self.root_tol,
            max_step: self.max_step,
            error_on_not_single: self.error_on_not_single,
            zeta: self.zeta,
            adaptive_params: self.adaptive.clone().into(),
            min_params: self.minimizer.clone().into(),
            fire_params: self.fire.clone().into(),
            itp_params: self.itp.clone().into(),
        }
    }
}

macro_rules! toml_mirror {
    ($toml_name:ident, $target:ty, $default:expr, { $($field:ident : $ty:ty),+ $(,)? }) => {
        #[derive(Clone, Debug, Deserialize)]
        pub struct $toml_name {
            $(#[serde(default)] pub $field: Option<$ty>,)+
        }

        impl Default for $toml_name {
            fn default() -> Self {
                Self { $($field: None,)+ }
            }
        }

        impl From<$toml_name> for $target {
            fn from(toml: $toml_name) -> Self {
                let d = $default;
                Self {
                    $($field: toml.$field.unwrap_or(d.$field),)+
                }
            }
        }
    };
}

toml_mirror!(AdaptiveParamsToml, AdaptiveParams, AdaptiveParams::default(), {
    max_inner_iter: usize,
    dt_min: f64,
    dt_max: f64,
    q_min: f64,
    q_max: f64,
    eps_rel: f64,
    eps_abs: f64,
});

toml_mirror!(MinimizerParamsToml, MinimizerParams, MinimizerParams::default(), {
    f_tol: f64,
    e_tol: f64,
    max_iter: usize,
});

toml_mirror!(Fire2ParamsToml, Fire2Params, Fire2Params::default(), {
    alpha0: f64,
    n_delay: usize,
    finc: f64,
    fdec: f64,
    falpha: f64,
    n_neg_max: usize,
    dt_min: f64,
    dt_max: f64,
});

toml_mirror!(ItpParamsToml, ItpParams, ItpParams::default(), {
    n0: usize,
    k1_scale: f64,
    k2: f64,
});

/// One `[save_points.*]` entry: `start`/`step`, optionally logarithmic.
#[derive(Clone, Debug, Deserialize)]
pub struct ScheduleToml {
    pub start: f64,
    pub step: f64,
    #[serde(default)]
    pub logarithmic: bool,
}

impl From<ScheduleToml> for SavePointSchedule {
    fn from(t: ScheduleToml) -> Self {
        if t.logarithmic {
            SavePointSchedule::logarithmic(t.start, t.step)
        } else {
            SavePointSchedule::linear(t.start, t.step)
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SavePointConfigToml {
    pub strain_count: Option<ScheduleToml>,
    pub break_count: Option<ScheduleToml>,
    pub wall_time: Option<ScheduleToml>,
    pub strain_value: Option<ScheduleToml>,
}

impl From<SavePointConfigToml> for SavePointConfig {
    fn from(t: SavePointConfigToml) -> Self {
        Self {
            strain_count: t.strain_count.map(Into::into),
            break_count: t.break_count.map(Into::into),
            wall_time: t.wall_time.map(Into::into),
            strain_value: t.strain_value.map(Into::into),
        }
    }
}
