//! The quasi-static strain protocol: minimise, find the next bond to break,
//! relax the resulting cascade, repeat until `max_strain` or nothing left to
//! break.

use crate::deform::DeformAxis;
use crate::hybrid::{hybrid_step, HybridOutcome};
use crate::integrators::{AdaptiveEulerHeun, AdaptiveParams, Overdamped};
use crate::linesearch::QuadLineSearch;
use crate::minimize::{Fire2, Fire2Params, MinimizerParams};
use crate::roots::{Itp, ItpParams};
use springnet_core::{
    BreakLaw, BreakRecord, Column, Error, Network, NetworkDumpSink, ProtocolError, Result,
    TimeSeriesSink,
};

const EPS_ENERGY: f64 = 1e-12;

/// One of the four independent save-point watermarks (spec §4.J.6): linear
/// (`start, step`) or logarithmic (`start, multiplicative step`).
#[derive(Clone, Copy, Debug)]
pub struct SavePointSchedule {
    logarithmic: bool,
    step: f64,
    next: f64,
}

impl SavePointSchedule {
    #[must_use]
    pub fn linear(start: f64, step: f64) -> Self {
        Self {
            logarithmic: false,
            step,
            next: start,
        }
    }

    #[must_use]
    pub fn logarithmic(start: f64, mult: f64) -> Self {
        Self {
            logarithmic: true,
            step: mult,
            next: start,
        }
    }

    /// Advance the watermark and report whether `value` reached it.
    fn poll(&mut self, value: f64) -> bool {
        if value >= self.next {
            if self.logarithmic {
                self.next *= self.step;
            } else {
                self.next += self.step;
            }
            true
        } else {
            false
        }
    }
}

/// The four independent dump triggers. Any subset may be absent.
#[derive(Clone, Copy, Debug, Default)]
pub struct SavePointConfig {
    pub strain_count: Option<SavePointSchedule>,
    pub break_count: Option<SavePointSchedule>,
    pub wall_time: Option<SavePointSchedule>,
    pub strain_value: Option<SavePointSchedule>,
}

impl SavePointConfig {
    fn should_dump(&mut self, strain_count: u64, break_count: u64, time: f64, strain: f64) -> bool {
        // Every schedule is polled regardless of earlier results: each one
        // owns an independent watermark that must advance every call.
        let a = self
            .strain_count
            .as_mut()
            .is_some_and(|s| s.poll(strain_count as f64));
        let b = self
            .break_count
            .as_mut()
            .is_some_and(|s| s.poll(break_count as f64));
        let c = self.wall_time.as_mut().is_some_and(|s| s.poll(time));
        let d = self.strain_value.as_mut().is_some_and(|s| s.poll(strain));
        a || b || c || d
    }
}

/// Static configuration for one protocol run.
#[derive(Clone, Copy, Debug)]
pub struct QuasiStaticConfig {
    pub max_strain: f64,
    pub root_tol: f64,
    pub max_step: f64,
    pub error_on_not_single: bool,
    pub zeta: f64,
    pub adaptive_params: AdaptiveParams,
    pub min_params: MinimizerParams,
    pub fire_params: Fire2Params,
    pub itp_params: ItpParams,
}

impl Default for QuasiStaticConfig {
    fn default() -> Self {
        Self {
            max_strain: 0.1,
            root_tol: 1e-8,
            max_step: 1e-3,
            error_on_not_single: false,
            zeta: 1.0,
            adaptive_params: AdaptiveParams::default(),
            min_params: MinimizerParams::default(),
            fire_params: Fire2Params::default(),
            itp_params: ItpParams::default(),
        }
    }
}

/// Drives a [`Network`] through the quasi-static strain protocol, writing
/// time-series and bond-event rows and (optionally) network dumps.
pub struct QuasiStaticProtocol<A: DeformAxis> {
    axis: A,
    config: QuasiStaticConfig,
    save_points: SavePointConfig,
    strain_count: u64,
    total_break_count: u64,
    time: f64,
}

impl<A: DeformAxis> QuasiStaticProtocol<A> {
    #[must_use]
    pub fn new(axis: A, config: QuasiStaticConfig, save_points: SavePointConfig) -> Self {
        Self {
            axis,
            config,
            save_points,
            strain_count: 0,
            total_break_count: 0,
            time: 0.0,
        }
    }

    /// Strain a clone of `net` by `step`, minimise it with FIRE-2, and
    /// recompute forces with break detection disabled but stress enabled.
    fn eval_strain(&self, net: &Network, step: f64) -> Result<Network> {
        let mut clone = net.clone();
        self.axis.advance(&mut clone, step)?;
        let mut fire = Fire2::new(self.config.min_params, self.config.fire_params, 0.01);
        fire.minimise(&mut clone)?;
        clone.compute_forces(false, true)?;
        Ok(clone)
    }

    /// Scan `net`, returning `(max_threshold, broken_count)` (spec §4.J.3).
    fn break_data(net: &Network) -> (f64, usize) {
        net.break_data()
    }

    /// Find the next strain at which exactly one (or more) bonds cross
    /// their break threshold, returning the strained-and-minimised network
    /// at that point.
    fn find_next_break(
        &mut self,
        net: &Network,
        ts_sink: &mut dyn TimeSeriesSink,
    ) -> Result<Network> {
        let current = self.axis.strain(net);
        let at_a = self.eval_strain(net, 0.0)?;
        let (mut fa, broken_a) = Self::break_data(&at_a);
        if broken_a > 0 {
            return Err(ProtocolError::BreakAtLowerBound.into());
        }
        if current >= self.config.max_strain {
            return Err(ProtocolError::MaxStrainReached.into());
        }

        let mut a = current;
        loop {
            let b = (a + self.config.max_step).min(self.config.max_strain);
            let at_b = self.eval_strain(net, b - current)?;
            let (fb, broken_b) = Self::break_data(&at_b);

            if broken_b == 0 {
                self.emit_time_row(&at_b, "Strain", 0, ts_sink)?;
                if b >= self.config.max_strain {
                    return Err(ProtocolError::MaxStrainReached.into());
                }
                a = b;
                fa = fb;
                continue;
            }

            let mut a_b = a;
            let mut b_b = b;
            let mut fa_b = fa;
            let mut fb_b = fb;
            let mut accepted = at_b;
            let mut accepted_broken = broken_b;

            let mut solver = Itp::new(self.config.itp_params, a_b, b_b, self.config.root_tol)?;
            for _ in 0..solver.n_max() {
                let x = solver.guess_root(a_b, b_b, fa_b, fb_b)?;
                let at_x = self.eval_strain(net, x - current)?;
                let (fx, broken_x) = Self::break_data(&at_x);
                if fx >= 0.0 {
                    b_b = x;
                    fb_b = fx;
                    accepted = at_x;
                    accepted_broken = broken_x;
                } else {
                    a_b = x;
                    fa_b = fx;
                }
                if (b_b - a_b) < 2.0 * self.config.root_tol {
                    break;
                }
            }

            if accepted_broken == 0 {
                return Err(ProtocolError::ConvergedWithZeroBreaks.into());
            }
            if self.config.error_on_not_single && accepted_broken > 1 {
                return Err(ProtocolError::ConvergedWithMoreThanOneBreak.into());
            }
            return Ok(accepted);
        }
    }

    /// Cascade relaxation following a break: drain the break queue emitting
    /// bond events, then step with the hybrid integrator until settled,
    /// draining newly queued breaks each iteration.
    fn relax_break<'a, 'b: 'a>(
        &mut self,
        net: &mut Network,
        ts_sink: &mut dyn TimeSeriesSink,
        bond_sink: &mut dyn TimeSeriesSink,
        dump_sink: Option<&'a mut (dyn NetworkDumpSink + 'b)>,
    ) -> Result<u64> {
        net.compute_forces(true, true)?;
        let mut break_count = self.drain_breaks(net, bond_sink)?;

        let mut stepper = AdaptiveEulerHeun::new(
            Overdamped::new(self.config.zeta),
            self.config.adaptive_params,
            0.01,
        );
        let line_search = QuadLineSearch::new(0.1);

        let mut e_prev = net.energy();
        let mut dump_sink = dump_sink;
        for _ in 0..self.config.min_params.max_iter {
            let (outcome, dt) = hybrid_step(net, &mut stepper, &line_search)?;
            self.time += dt;

            net.compute_forces(true, true)?;
            let new_breaks = self.drain_breaks(net, bond_sink)?;
            break_count += new_breaks;

            if new_breaks > 0 {
                if let Some(sink) = dump_sink.as_deref_mut() {
                    sink.save(
                        net,
                        self.strain_count,
                        self.time,
                        &format!("Broken-{}-{}", self.strain_count, break_count),
                    )?;
                }
            }

            let e_curr = net.energy();
            let energy_settled = (e_curr - e_prev).abs()
                < self.config.min_params.e_tol
                    * 0.5
                    * (e_curr.abs() + e_prev.abs() + EPS_ENERGY);
            e_prev = e_curr;

            let force_settled = {
                let f2: f64 = net.nodes().forces().iter().map(|f| f.norm_sq()).sum();
                f2 < self.config.min_params.f_tol * self.config.min_params.f_tol
            };

            if new_breaks == 0 && (energy_settled || force_settled) {
                tracing::debug!(
                    strain_count = self.strain_count,
                    energy_settled,
                    force_settled,
                    "cascade converged"
                );
                break;
            }
            if outcome == HybridOutcome::Converged && new_breaks == 0 {
                tracing::debug!(
                    strain_count = self.strain_count,
                    "cascade converged: hybrid step stalled"
                );
                break;
            }
            let _ = ts_sink;
        }

        net.compute_forces(false, true)?;
        Ok(break_count)
    }

    fn drain_breaks(
        &mut self,
        net: &mut Network,
        bond_sink: &mut dyn TimeSeriesSink,
    ) -> Result<u64> {
        let records: Vec<_> = net.drain_break_queue().collect();
        for record in &records {
            self.emit_bond_row(net, record, bond_sink)?;
        }
        Ok(records.len() as u64)
    }

    fn emit_time_row(
        &self,
        net: &Network,
        reason: &str,
        break_count: u64,
        sink: &mut dyn TimeSeriesSink,
    ) -> Result<()> {
        let mut row = vec![
            Column::from(reason),
            Column::from(self.strain_count),
            Column::from(break_count),
            Column::from(self.time),
            Column::from(net.box2().lx()),
            Column::from(net.box2().ly()),
            Column::from(self.axis.strain(net)),
            Column::from(net.bonds().count_connected()),
        ];
        for slot in net.tags().slots() {
            let mask = springnet_core::TagSet::from_mask(1u16 << slot);
            row.push(Column::from(net.bonds().count_connected_with_tag(mask)));
        }
        row.push(Column::from(
            net.count_connected_of_kind(springnet_core::BondKind::Harmonic),
        ));
        let total = net.stress().total();
        row.extend([
            Column::from(total.xx),
            Column::from(total.xy),
            Column::from(total.yx),
            Column::from(total.yy),
        ]);
        for slot in net.tags().slots() {
            let mask = springnet_core::TagSet::from_mask(1u16 << slot);
            let t = net.stress().get(mask).unwrap_or_default();
            row.extend([
                Column::from(t.xx),
                Column::from(t.xy),
                Column::from(t.yx),
                Column::from(t.yy),
            ]);
        }
        sink.write(&row)
    }

    fn emit_bond_row(
        &self,
        net: &Network,
        record: &BreakRecord,
        sink: &mut dyn TimeSeriesSink,
    ) -> Result<()> {
        let info = net.bonds().infos()[record.index];
        let src = net.nodes().positions()[info.src];
        let dst = net.nodes().positions()[info.dst];
        let d = net.box2().min_image(src, dst);
        let law = record.prior_force_law;
        let break_law = record.prior_break_law;

        let rms_force = {
            let sum_sq: f64 = net.nodes().forces().iter().map(|f| f.norm_sq()).sum();
            (sum_sq / net.nodes().len().max(1) as f64).sqrt()
        };
        let max_force = net
            .nodes()
            .forces()
            .iter()
            .fold(0.0f64, |m, f| m.max(f.abs().max_component()));

        let lambda = match break_law {
            BreakLaw::StrainThreshold { lambda, .. } => lambda,
            BreakLaw::None => 0.0,
        };

        let mut row = vec![
            Column::from(self.strain_count),
            Column::from(self.time),
            Column::from(law.kind().as_str()),
            Column::from(law.k().unwrap_or(0.0)),
            Column::from(lambda),
            Column::from(law.r0().unwrap_or(0.0)),
            Column::from(law.data(d).unwrap_or(0.0)),
            Column::from(info.src),
            Column::from(info.dst),
            Column::from(src.x),
            Column::from(src.y),
            Column::from(dst.x),
            Column::from(dst.y),
            Column::from(net.box2().lx()),
            Column::from(net.box2().ly()),
            Column::from(self.axis.strain(net)),
            Column::from(rms_force),
            Column::from(max_force),
        ];
        row.push(Column::from(net.bonds().count_connected()));
        sink.write(&row)
    }

    /// The outer quasi-static loop (spec §4.J.1): minimise, then repeatedly
    /// find and relax the next break until `max_strain` is reached or
    /// nothing is left above threshold.
    pub fn run<'b>(
        &mut self,
        net: &mut Network,
        ts_sink: &mut dyn TimeSeriesSink,
        bond_sink: &mut dyn TimeSeriesSink,
        mut dump_sink: Option<&'b mut (dyn NetworkDumpSink + 'b)>,
    ) -> Result<()> {
        let mut fire = Fire2::new(self.config.min_params, self.config.fire_params, 0.01);
        fire.minimise(net)?;
        net.compute_forces(false, true)?;
        self.emit_time_row(net, "Initial", 0, ts_sink)?;
        if let Some(sink) = dump_sink.as_deref_mut() {
            sink.save(net, 0, 0.0, "Initial")?;
        }

        loop {
            self.strain_count += 1;
            self.time = 0.0;

            let next = match self.find_next_break(net, ts_sink) {
                Ok(n) => n,
                Err(Error::Protocol(ProtocolError::MaxStrainReached)) => break,
                Err(e) => return Err(e),
            };
            *net = next;

            self.emit_time_row(net, "Start", 0, ts_sink)?;
            if let Some(sink) = dump_sink.as_deref_mut() {
                sink.save(net, self.strain_count, 0.0, "Start")?;
            }

            let break_count =
                self.relax_break(net, ts_sink, bond_sink, dump_sink.as_deref_mut())?;
            self.total_break_count += break_count;

            self.emit_time_row(net, "End", break_count, ts_sink)?;
            if let Some(sink) = dump_sink.as_deref_mut() {
                sink.save(net, self.strain_count, self.time, "End")?;
            }

            let strain_now = self.axis.strain(net);
            if self.save_points.should_dump(
                self.strain_count,
                self.total_break_count,
                self.time,
                strain_now,
            ) {
                if let Some(sink) = dump_sink.as_deref_mut() {
                    sink.save(
                        net,
                        self.strain_count,
                        self.time,
                        &format!("Scheduled-{}", self.strain_count),
                    )?;
                }
            }

            if strain_now >= self.config.max_strain {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deform::Shear;
    use springnet_core::{Box2, BreakLaw, ForceLaw, TagSet, Vec2};

    struct VecSink(Vec<Vec<Column>>);
    impl TimeSeriesSink for VecSink {
        fn write(&mut self, columns: &[Column]) -> Result<()> {
            self.0.push(columns.to_vec());
            Ok(())
        }
    }

    fn triangle_net() -> Network {
        let b = Box2::new(10.0, 10.0, 0.0).unwrap();
        let mut net = Network::with_capacity(b, 3, 3);
        net.nodes_mut().add_node(0, Vec2::new(4.0, 5.0), Vec2::ZERO, 1.0);
        net.nodes_mut().add_node(1, Vec2::new(6.0, 5.0), Vec2::ZERO, 1.0);
        net.nodes_mut()
            .add_node(2, Vec2::new(5.0, 5.0 + 1.732), Vec2::ZERO, 1.0);
        for (a, c) in [(0, 1), (1, 2), (2, 0)] {
            net.bonds_mut().add_bond(
                a,
                c,
                ForceLaw::harmonic(1.0, 2.0, false),
                BreakLaw::strain_threshold(0.05, 2.0),
                TagSet::EMPTY,
            );
        }
        net
    }

    #[test]
    fn run_completes_and_emits_rows() {
        let mut net = triangle_net();
        let config = QuasiStaticConfig {
            max_strain: 0.02,
            max_step: 0.005,
            ..QuasiStaticConfig::default()
        };
        let mut protocol = QuasiStaticProtocol::new(Shear, config, SavePointConfig::default());
        let mut ts = VecSink(Vec::new());
        let mut bonds = VecSink(Vec::new());
        protocol.run(&mut net, &mut ts, &mut bonds, None).unwrap();
        assert!(!ts.0.is_empty());
    }
}
