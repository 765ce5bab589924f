//! Running totals of what an injector has introduced.

use crate::{Communicator, ModelProperties};

/// Running totals of an injector, summed over all partitions.
///
/// These only ever grow, and are persisted across restarts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InjectionTotals {
    /// Total mass of particles injected.
    pub mass_injected: f64,
    /// Number of injection passes performed.
    pub n_injections: usize,
    /// Total number of parcels injected.
    pub parcels_added_total: usize,
}

/// What one injection pass added, summed over all partitions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InjectionReport {
    /// Number of parcels added.
    pub parcels_added: usize,
    /// Mass of the particles added.
    pub mass_added: f64,
}

/// Scope a restart property key to an injector.
pub(crate) fn property_key(injector: &str, key: &str) -> String {
    format!("{injector}.{key}")
}

impl InjectionTotals {
    /// Restore totals persisted by a previous run,
    /// or start from zero if there are none.
    pub fn restore(props: &dyn ModelProperties, injector: &str) -> Self {
        let get = |key: &str| props.get_or(&property_key(injector, key), 0.);
        Self {
            mass_injected: get("massInjected"),
            n_injections: get("nInjections") as usize,
            parcels_added_total: get("parcelsAddedTotal") as usize,
        }
    }

    /// Persist the totals along with the injector's time cursor.
    pub fn write(&self, props: &mut dyn ModelProperties, injector: &str, time_step0: f64) {
        props.set(&property_key(injector, "massInjected"), self.mass_injected);
        props.set(&property_key(injector, "nInjections"), self.n_injections as f64);
        props.set(
            &property_key(injector, "parcelsAddedTotal"),
            self.parcels_added_total as f64,
        );
        props.set(&property_key(injector, "timeStep0"), time_step0);
    }

    /// Sum what this partition added over all partitions
    /// and add it to the totals.
    ///
    /// This is a collective call and must be made by every partition
    /// after every injection pass, whether or not anything was added locally.
    /// Only the first partition logs the pass.
    pub fn record(
        &mut self,
        comm: &dyn Communicator,
        cloud: &str,
        injector: &str,
        parcels_added: usize,
        mass_added: f64,
    ) -> InjectionReport {
        let report = InjectionReport {
            parcels_added: comm.reduce_sum_count(parcels_added),
            mass_added: comm.reduce_sum(mass_added),
        };

        if report.parcels_added > 0 && comm.rank() == 0 {
            log::info!(
                "Cloud: {cloud} injector: {injector}\n    Added {} new parcels",
                report.parcels_added
            );
        }

        self.parcels_added_total += report.parcels_added;
        self.mass_injected += report.mass_added;
        self.n_injections += 1;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LocalGroup, PropertyStore, SerialCommunicator};
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    /// Keeps log messages about the injector named `logged-once`.
    struct Captured(Mutex<Vec<String>>);

    impl log::Log for Captured {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            let msg = record.args().to_string();
            if msg.contains("logged-once") {
                self.0.lock().unwrap().push(msg);
            }
        }

        fn flush(&self) {}
    }

    static CAPTURED: Captured = Captured(Mutex::new(Vec::new()));

    #[test]
    fn empty_pass_leaves_totals() {
        let mut totals = InjectionTotals {
            mass_injected: 0.5,
            n_injections: 3,
            parcels_added_total: 40,
        };
        let report = totals.record(&SerialCommunicator, "cloud", "inj", 0, 0.);
        assert_eq!(report, InjectionReport::default());
        assert_eq!(totals.mass_injected, 0.5);
        assert_eq!(totals.parcels_added_total, 40);
    }

    #[test]
    fn passes_are_summed_over_partitions() {
        let comms = LocalGroup::new(3);
        let totals: Vec<InjectionTotals> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let mut totals = InjectionTotals::default();
                        // only the first two partitions own parcels
                        let local = if comm.rank() < 2 { comm.rank() + 1 } else { 0 };
                        totals.record(comm, "cloud", "inj", local, 0.1 * local as f64);
                        totals
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for t in &totals {
            assert_eq!(t.parcels_added_total, 3);
            assert_eq!(t.n_injections, 1);
            assert_relative_eq!(t.mass_injected, 0.3, epsilon = 1e-12);
        }
    }

    #[test]
    fn pass_is_logged_by_one_partition() {
        // no other test installs a logger
        let _ = log::set_logger(&CAPTURED);
        log::set_max_level(log::LevelFilter::Info);

        let comms = LocalGroup::new(3);
        std::thread::scope(|s| {
            for comm in &comms {
                s.spawn(move || {
                    InjectionTotals::default().record(comm, "cloud", "logged-once", 1, 0.1);
                });
            }
        });

        let messages = CAPTURED.0.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Added 3 new parcels"));
    }

    #[test]
    fn persisted_totals_are_restored() {
        let totals = InjectionTotals {
            mass_injected: 1.5,
            n_injections: 7,
            parcels_added_total: 120,
        };
        let mut store = PropertyStore::new();
        totals.write(&mut store, "nozzle", 0.3);

        assert_eq!(InjectionTotals::restore(&store, "nozzle"), totals);
        assert_eq!(store.get("nozzle.timeStep0"), Some(0.3));
        // other injectors' state is separate
        assert_eq!(InjectionTotals::restore(&store, "other"), InjectionTotals::default());
    }
}
