//! The injection engine: scheduling injection over time and creating parcels.
//!
//! Each carrier timestep, the driving solver calls [`InjectionModel::step`]
//! (or [`inject`][InjectionModel::inject] /
//! [`inject_steady_state`][InjectionModel::inject_steady_state] directly)
//! on every partition with the same time.
//! The model asks its [`InjectionStrategy`] how many parcels are due,
//! locates and creates the ones this partition owns,
//! and finally sums what was added over all partitions.

use crate::{
    bookkeeping::property_key, strategy::new_strategy, CellLocation, CellLocator, ConfigError,
    InjectionConfig, InjectionError, InjectionReport, InjectionStrategy, InjectionTotals,
    ModelProperties, Parcel, ParcelBasis, ParcelCloud, SolutionMode, TetMesh, TimeFunction,
    TrackingData, Vec3,
};

/// Added to the total volume before dividing by it,
/// so an injector with no volume gives zero fractions instead of NaN.
const ROOT_VSMALL: f64 = 1e-150;

/// The state of the injection scheduler for one timestep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// Injection hasn't started yet.
    Dormant,
    /// Parcels are due this step.
    Active,
    /// Some volume is due, but not enough to make a whole parcel.
    /// The interval is held open and carried over to the next step.
    Holding,
    /// Nothing is due in this interval.
    Exhausted,
}

/// The scheduler's decision for one timestep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledStep {
    /// What the scheduler decided.
    pub state: SchedulerState,
    /// Number of parcels due.
    pub new_parcels: usize,
    /// Fraction of the injector's total volume due.
    pub new_volume_fraction: f64,
}

impl ScheduledStep {
    /// Check if parcels should be injected this step.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == SchedulerState::Active
    }
}

/// A candidate parcel within one injection pass.
struct Candidate {
    index: usize,
    n_parcels: usize,
    time: f64,
    /// parcel count the basis divides the volume fraction between
    basis_parcels: usize,
    volume_fraction: f64,
    step_fraction: f64,
}

/// What one injection pass created on this partition,
/// and the first error hit while doing so.
#[derive(Default)]
struct LocalPass {
    parcels_added: usize,
    mass_added: f64,
    error: Option<InjectionError>,
}

impl LocalPass {
    fn fail(&mut self, error: InjectionError) {
        self.error.get_or_insert(error);
    }
}

/// A model introducing parcels into a cloud over time.
///
/// One of these exists per injector on every partition.
/// All partitions must construct it from the same configuration
/// and call it at the same times;
/// the methods taking a [`CellLocator`] are collective calls.
pub struct InjectionModel {
    name: String,
    strategy: Box<dyn InjectionStrategy>,
    mode: SolutionMode,
    soi: f64,
    volume_total: f64,
    mass_total: f64,
    mass_flow_rate: Option<TimeFunction>,
    parcel_basis: ParcelBasis,
    totals: InjectionTotals,
    /// time of the previous injection pass
    time0: f64,
    /// end of the last interval consumed by the scheduler
    time_step0: f64,
    constraint_tolerance: f64,
}

impl std::fmt::Debug for InjectionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionModel")
            .field("name", &self.name)
            .field("strategy", &self.strategy.type_name())
            .field("mode", &self.mode)
            .field("soi", &self.soi)
            .field("mass_total", &self.mass_total)
            .field("parcel_basis", &self.parcel_basis)
            .field("totals", &self.totals)
            .field("time0", &self.time0)
            .field("time_step0", &self.time_step0)
            .finish_non_exhaustive()
    }
}

impl InjectionModel {
    /// Create an injection model with the strategy given in its configuration.
    ///
    /// Running totals are restored from `props` if a previous run stored them.
    pub fn new(
        config: &InjectionConfig,
        mode: SolutionMode,
        mesh: &TetMesh,
        props: &dyn ModelProperties,
        time: f64,
    ) -> Result<Self, InjectionError> {
        let model = config.model.as_ref().ok_or(ConfigError::MissingKey("model"))?;
        let strategy = new_strategy(model)?;
        Self::with_strategy(config, strategy, mode, mesh, props, time)
    }

    /// Create an injection model with a strategy constructed elsewhere.
    /// The `model` entry of the configuration is ignored.
    pub fn with_strategy(
        config: &InjectionConfig,
        strategy: Box<dyn InjectionStrategy>,
        mode: SolutionMode,
        mesh: &TetMesh,
        props: &dyn ModelProperties,
        time: f64,
    ) -> Result<Self, InjectionError> {
        log::info!("    Constructing {}-D injection", mesh.n_geometric_d());

        let (soi, mass_total, mass_flow_rate) = match mode {
            SolutionMode::Transient => {
                let (mass_total, soi) = config.transient_settings()?;
                (soi, mass_total, None)
            }
            SolutionMode::Steady => {
                let rate = config.steady_flow_rate()?.clone();
                (0., rate.value(time), Some(rate))
            }
        };

        let parcel_basis = config.parcel_basis()?;
        if let ParcelBasis::Fixed { .. } = parcel_basis {
            log::info!(
                "    Choosing nParticle to be a fixed value, \
                 massTotal variable now does not determine anything."
            );
        }

        let name = config.name.clone();
        let totals = InjectionTotals::restore(props, &name);
        let time_step0 = props.get_or(&property_key(&name, "timeStep0"), 0.);

        Ok(Self {
            volume_total: strategy.volume_total(),
            name,
            strategy,
            mode,
            soi,
            mass_total,
            mass_flow_rate,
            parcel_basis,
            totals,
            time0: time,
            time_step0,
            constraint_tolerance: config.constraint_tolerance()?,
        })
    }

    /// Name of the injector.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The strategy driving the injector.
    #[inline]
    pub fn strategy(&self) -> &dyn InjectionStrategy {
        self.strategy.as_ref()
    }

    /// Whether the model injects in transient or steady mode.
    #[inline]
    pub fn mode(&self) -> SolutionMode {
        self.mode
    }

    /// Start of injection.
    #[inline]
    pub fn soi(&self) -> f64 {
        self.soi
    }

    /// Start of the injection window. Same as [`soi`][Self::soi].
    #[inline]
    pub fn time_start(&self) -> f64 {
        self.soi
    }

    /// End of the injection window.
    #[inline]
    pub fn time_end(&self) -> f64 {
        self.soi + self.strategy.duration()
    }

    /// Total mass to inject.
    /// In steady mode, the mass flow rate at the latest injection.
    #[inline]
    pub fn mass_total(&self) -> f64 {
        self.mass_total
    }

    /// Total volume the strategy injects over its lifetime.
    #[inline]
    pub fn volume_total(&self) -> f64 {
        self.volume_total
    }

    /// How the number of particles per parcel is decided.
    #[inline]
    pub fn parcel_basis(&self) -> ParcelBasis {
        self.parcel_basis
    }

    /// Running totals over all partitions.
    #[inline]
    pub fn totals(&self) -> &InjectionTotals {
        &self.totals
    }

    /// Time of the previous injection pass.
    #[inline]
    pub fn time0(&self) -> f64 {
        self.time0
    }

    /// End of the last interval the scheduler has consumed.
    #[inline]
    pub fn time_step0(&self) -> f64 {
        self.time_step0
    }

    /// The mass of an average parcel over the injector's lifetime,
    /// or None if the injector never introduces any parcels.
    pub fn average_parcel_mass(&self) -> Option<f64> {
        let n_total = match self.mode {
            SolutionMode::Transient => {
                self.strategy
                    .parcels_to_inject(0., self.time_end() - self.time_start())
            }
            SolutionMode::Steady => self.strategy.parcels_to_inject(0., 1.),
        };
        (n_total > 0).then(|| self.mass_total / n_total as f64)
    }

    /// Decide what to inject over the interval since the last one consumed,
    /// ending at `time`.
    ///
    /// The interval start only moves forward once its volume has been
    /// turned into parcels, so volume too small to make a whole parcel
    /// accumulates over steps instead of being lost.
    pub fn prepare_for_next_time_step(&mut self, time: f64) -> ScheduledStep {
        let mut step = ScheduledStep {
            state: SchedulerState::Dormant,
            new_parcels: 0,
            new_volume_fraction: 0.,
        };

        if time < self.soi {
            self.time_step0 = time;
            return step;
        }

        let t0 = self.time_step0 - self.soi;
        let t1 = time - self.soi;

        step.new_parcels = self.strategy.parcels_to_inject(t0, t1);
        step.new_volume_fraction =
            self.strategy.volume_to_inject(t0, t1) / (self.volume_total + ROOT_VSMALL);

        step.state = if step.new_volume_fraction > 0. {
            if step.new_parcels > 0 {
                self.time_step0 = time;
                SchedulerState::Active
            } else {
                SchedulerState::Holding
            }
        } else {
            self.time_step0 = time;
            SchedulerState::Exhausted
        };

        log::debug!(
            "Injector {} over [{t0}, {t1}]: {:?}, {} parcels, volume fraction {}",
            self.name,
            step.state,
            step.new_parcels,
            step.new_volume_fraction
        );
        step
    }

    /// Run one injection pass in the way the model's [`SolutionMode`] calls for.
    pub fn step<C: ParcelCloud + ?Sized>(
        &mut self,
        cloud: &mut C,
        locator: &CellLocator,
        td: &TrackingData,
        time: f64,
    ) -> Result<InjectionReport, InjectionError> {
        match self.mode {
            SolutionMode::Transient => self.inject(cloud, locator, td, time),
            SolutionMode::Steady => self.inject_steady_state(cloud, locator, td, time),
        }
    }

    /// Inject the parcels due over the timestep ending at `time`.
    ///
    /// New parcels are spread evenly over the part of the timestep
    /// the injector was active in, and given a step fraction
    /// so they only travel for the remainder of the step once tracked.
    ///
    /// Candidates outside the mesh are skipped.
    /// An error on any partition makes the call fail on every partition.
    pub fn inject<C: ParcelCloud + ?Sized>(
        &mut self,
        cloud: &mut C,
        locator: &CellLocator,
        td: &TrackingData,
        time: f64,
    ) -> Result<InjectionReport, InjectionError> {
        let mut pass = LocalPass::default();

        let step = self.prepare_for_next_time_step(time);
        if step.is_active() {
            // duration of the injection period during this timestep
            let delta_t = td
                .track_time
                .min((time - self.soi).min(self.time_end() - self.time0))
                .max(0.);
            // pad injection time if injection starts during this timestep
            let pad_time = (self.soi - self.time0).max(0.);

            let n = step.new_parcels;
            for parcel_i in 0..n {
                if !self.strategy.valid_injection(parcel_i) {
                    continue;
                }
                let time_inj = self.time0 + pad_time + delta_t * parcel_i as f64 / n as f64;
                let dt = time_inj - self.time0;
                let step_fraction = if td.track_time > 0. {
                    dt / td.track_time
                } else {
                    0.
                };

                let candidate = Candidate {
                    index: parcel_i,
                    n_parcels: n,
                    time: time_inj,
                    basis_parcels: n,
                    volume_fraction: step.new_volume_fraction,
                    step_fraction,
                };
                self.inject_candidate(cloud, locator, candidate, &mut pass);
            }
        }

        self.finish_pass(cloud.name(), locator, pass, time)
    }

    /// Inject one batch of parcels for a steady carrier solution.
    ///
    /// The batch is the number of parcels the strategy would inject
    /// over its first second, each carrying an equal share
    /// of the current mass flow rate.
    pub fn inject_steady_state<C: ParcelCloud + ?Sized>(
        &mut self,
        cloud: &mut C,
        locator: &CellLocator,
        _td: &TrackingData,
        time: f64,
    ) -> Result<InjectionReport, InjectionError> {
        if let Some(rate) = &self.mass_flow_rate {
            self.mass_total = rate.value(time);
        }

        self.time0 = 0.;
        let mut pass = LocalPass::default();

        let n = self.strategy.parcels_to_inject(0., 1.);
        for parcel_i in 0..n {
            let candidate = Candidate {
                index: parcel_i,
                n_parcels: n,
                time: 0.,
                basis_parcels: 1,
                volume_fraction: 1. / n as f64,
                step_fraction: 0.,
            };
            self.inject_candidate(cloud, locator, candidate, &mut pass);
        }

        self.finish_pass(cloud.name(), locator, pass, time)
    }

    /// Locate a candidate and create it if this partition owns it.
    ///
    /// Locating is collective, so it happens for every candidate
    /// even after this partition has failed;
    /// nothing more is created once it has.
    fn inject_candidate<C: ParcelCloud + ?Sized>(
        &mut self,
        cloud: &mut C,
        locator: &CellLocator,
        c: Candidate,
        pass: &mut LocalPass,
    ) {
        let location = match self
            .strategy
            .set_position_and_cell(c.index, c.n_parcels, c.time, locator)
        {
            Ok(Some(location)) if pass.error.is_none() => location,
            Ok(_) => return,
            Err(err) => return pass.fail(err),
        };

        match self.create_parcel(cloud, locator.mesh(), &location, &c) {
            Ok(Some(mass)) => {
                pass.parcels_added += 1;
                pass.mass_added += mass;
            }
            Ok(None) => {}
            Err(err) => pass.fail(err),
        }
    }

    /// Create a located candidate and hand it to the cloud.
    /// Returns the mass of the created parcel,
    /// or None if it was skipped for carrying no particles.
    fn create_parcel<C: ParcelCloud + ?Sized>(
        &mut self,
        cloud: &mut C,
        mesh: &TetMesh,
        location: &CellLocation,
        c: &Candidate,
    ) -> Result<Option<f64>, InjectionError> {
        let mut parcel = Parcel::new(location);
        constrain_position(&mut parcel, mesh, self.constraint_tolerance);

        cloud.set_parcel_thermo_properties(&mut parcel);
        self.strategy
            .set_properties(c.index, c.n_parcels, c.time, &mut parcel);
        cloud.check_parcel_properties(&mut parcel, self.strategy.fully_described())?;

        mesh.solution_directions().constrain(&mut parcel.u);

        parcel.n_particle = self.parcel_basis.number_of_particles(
            c.basis_parcels,
            c.volume_fraction,
            parcel.d,
            parcel.rho,
            self.mass_total,
            self.volume_total,
        );
        if !(parcel.n_particle.is_finite() && parcel.n_particle > 0.) {
            log::debug!(
                "Skipping parcel {} of injector {} with nParticle = {}",
                c.index,
                self.name,
                parcel.n_particle
            );
            return Ok(None);
        }

        parcel.step_fraction = c.step_fraction;

        let mass = parcel.total_mass();
        cloud.add_particle(parcel);
        Ok(Some(mass))
    }

    /// Agree with the other partitions on whether the pass succeeded,
    /// then sum it up.
    /// If any partition failed, every partition returns an error.
    fn finish_pass(
        &mut self,
        cloud_name: &str,
        locator: &CellLocator,
        pass: LocalPass,
        time: f64,
    ) -> Result<InjectionReport, InjectionError> {
        let failed_here = i64::from(pass.error.is_some());
        if locator.comm().reduce_max(failed_here) > 0 {
            return Err(pass.error.unwrap_or(InjectionError::RemoteFailure));
        }
        Ok(self.post_inject_check(
            cloud_name,
            locator,
            pass.parcels_added,
            pass.mass_added,
            time,
        ))
    }

    /// Sum up an injection pass over all partitions
    /// and move on to the next one.
    fn post_inject_check(
        &mut self,
        cloud_name: &str,
        locator: &CellLocator,
        parcels_added: usize,
        mass_added: f64,
        time: f64,
    ) -> InjectionReport {
        let report =
            self.totals
                .record(locator.comm(), cloud_name, &self.name, parcels_added, mass_added);
        self.time0 = time;
        report
    }

    /// Report the running totals,
    /// and persist them along with the scheduler state if `write_time` is set.
    pub fn info(&self, write_time: bool, props: &mut dyn ModelProperties) {
        log::info!(
            "    {}:\n        number of parcels added     = {}\n        mass introduced             = {}",
            self.name,
            self.totals.parcels_added_total,
            self.totals.mass_injected
        );

        if write_time {
            self.totals.write(props, &self.name, self.time_step0);
        }
    }
}

/// Move a parcel onto the centre plane of the mesh
/// along any direction the solution isn't computed in.
///
/// A parcel starting on a face is moved in two halves, slightly towards
/// the cell centre on the first and slightly away on the second,
/// so the track doesn't end right away on a boundary hit.
/// The parcel's original face is restored afterwards.
fn constrain_position(parcel: &mut Parcel, mesh: &TetMesh, tolerance: f64) {
    let d = parcel.deviation_from_mesh_centre(mesh);
    if d == Vec3::zeros() {
        return;
    }

    let face = parcel.face;
    match face {
        None => {
            parcel.track(mesh, -d);
        }
        Some(_) => {
            let pc = mesh.centroid(parcel.cell) - parcel.position;
            parcel.track(mesh, -d / 2. + tolerance * pc);
            parcel.track(mesh, -d / 2. - tolerance * pc);
        }
    }
    parcel.face = face;
}
