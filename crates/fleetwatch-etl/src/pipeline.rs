//! ETL orchestration: fetch, validate, resolve, classify, write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use fleetwatch_core::error::FleetResult;
use fleetwatch_core::models::register::DisconnectionType;
use fleetwatch_core::models::snapshot::Snapshot;
use fleetwatch_core::repository::FleetStore;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::EtlConfig;
use crate::error::EtlError;
use crate::fetcher::TelemetrySource;
use crate::resolver::{EntityResolver, Resolution};
use crate::rules;
use crate::validation::{self, ValidSnapshot, VinFilter};
use crate::writer::{NewDisconnection, RegisterService};

/// Counters for one run. This is the whole observable result of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EtlStats {
    pub fetched: u64,
    /// Dropped by the VIN filter.
    pub filtered_out: u64,
    /// Failed decoding or validation.
    pub invalid: u64,
    pub valid: u64,
    pub clients_created: u64,
    pub groups_created: u64,
    pub distributors_created: u64,
    pub geofences_created: u64,
    pub vehicles_created: u64,
    pub vehicles_updated: u64,
    /// Valid snapshots that were not disconnections.
    pub connected: u64,
    pub registers_created: u64,
    /// Disconnections whose register for today already existed.
    pub registers_existing: u64,
    pub route_disconnections: u64,
    pub base_disconnections: u64,
    /// Records that failed resolution or writing.
    pub errors: u64,
}

/// What happened to one valid record.
#[derive(Debug)]
struct RecordOutcome {
    resolution: Resolution,
    /// Classification and whether the register was new.
    disconnection: Option<(DisconnectionType, bool)>,
}

impl EtlStats {
    fn record(&mut self, outcome: &RecordOutcome) {
        let created = &outcome.resolution.created;
        self.clients_created += u64::from(created.client);
        self.groups_created += u64::from(created.group);
        self.distributors_created += u64::from(created.distributor);
        self.geofences_created += u64::from(created.geofence);
        if created.vehicle {
            self.vehicles_created += 1;
        } else {
            self.vehicles_updated += 1;
        }

        match outcome.disconnection {
            None => self.connected += 1,
            Some((_, false)) => self.registers_existing += 1,
            Some((kind, true)) => {
                self.registers_created += 1;
                match kind {
                    DisconnectionType::Route => self.route_disconnections += 1,
                    DisconnectionType::Base => self.base_disconnections += 1,
                }
            }
        }
    }
}

/// Drives one ETL run against a store and a telemetry source.
pub struct EtlService<S: FleetStore, T: TelemetrySource> {
    store: S,
    source: T,
    registers: RegisterService<S>,
    config: EtlConfig,
    cancel: Arc<AtomicBool>,
}

impl<S: FleetStore + Clone, T: TelemetrySource> EtlService<S, T> {
    pub fn new(store: S, source: T, config: EtlConfig) -> Self {
        let registers =
            RegisterService::new(store.clone(), config.rules.clone(), config.policy.clone());
        Self {
            store,
            source,
            registers,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between batches. Setting it stops the run after the
    /// current batch; committed batches stay.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub async fn run(&self, max_pages: u32) -> Result<EtlStats, EtlError> {
        self.run_at(max_pages, Utc::now()).await
    }

    /// Run with `now` as the processing instant.
    pub async fn run_at(&self, max_pages: u32, now: DateTime<Utc>) -> Result<EtlStats, EtlError> {
        let today = rules::report_date(now, self.config.rules.offset());
        info!(max_pages, %today, "ETL run started");

        let raw = self.source.fetch_all(max_pages).await?;
        let mut stats = EtlStats {
            fetched: raw.len() as u64,
            ..Default::default()
        };

        let records = self.screen(raw, &mut stats);
        let resolver = EntityResolver::new(&self.store, &self.config.rules);
        let resolver = &resolver;
        let batch_size = self.config.batch_size.max(1);

        for (index, batch) in records.chunks(batch_size).enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                warn!(batch = index, ?stats, "ETL run cancelled");
                return Ok(stats);
            }

            if let Err(e) = self.store.health_check().await {
                error!(batch = index, error = %e, ?stats, "Store unavailable, aborting run");
                return Err(EtlError::Aborted {
                    source: e,
                    stats: Box::new(stats),
                });
            }

            let outcomes: Vec<_> = stream::iter(batch)
                .map(|record| async move {
                    (record, self.process(resolver, record, now, today).await)
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

            for (record, outcome) in outcomes {
                match outcome {
                    Ok(outcome) => stats.record(&outcome),
                    Err(e) => {
                        stats.errors += 1;
                        warn!(vehicle_id = record.vehicle_id, error = %e, "Record failed");
                    }
                }
            }
            info!(batch = index, records = batch.len(), "Batch processed");
        }

        info!(?stats, "ETL run finished");
        Ok(stats)
    }

    /// Decode, filter and validate raw records. Each record passes the
    /// VIN filter exactly once.
    fn screen(&self, raw: Vec<serde_json::Value>, stats: &mut EtlStats) -> Vec<ValidSnapshot> {
        let filter = VinFilter::new(&self.config.vin_filter_pattern);
        let mut valid = Vec::with_capacity(raw.len());

        for value in raw {
            let snapshot = match Snapshot::from_json(value) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    stats.invalid += 1;
                    warn!(error = %e, "Undecodable snapshot");
                    continue;
                }
            };

            if !filter.matches(snapshot.vin.as_deref()) {
                stats.filtered_out += 1;
                continue;
            }

            let vehicle_id = snapshot.vehicle_id;
            match validation::validate(snapshot) {
                Ok(record) => {
                    stats.valid += 1;
                    valid.push(record);
                }
                Err(errors) => {
                    stats.invalid += 1;
                    let errors = errors.join("; ");
                    warn!(vehicle_id = ?vehicle_id, %errors, "Invalid snapshot");
                }
            }
        }

        valid
    }

    async fn process(
        &self,
        resolver: &EntityResolver<'_, S>,
        record: &ValidSnapshot,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> FleetResult<RecordOutcome> {
        let resolution = resolver.resolve(record).await?;
        let snap = &record.snapshot;

        if !rules::is_disconnected(
            snap.last_communication_time.as_deref(),
            today,
            self.config.rules.offset(),
        ) {
            return Ok(RecordOutcome {
                resolution,
                disconnection: None,
            });
        }

        let speed = match snap.speed {
            Some(speed) if !rules::is_plausible_speed(speed) => {
                warn!(vehicle_id = record.vehicle_id, speed, "Implausible speed, treating as 0");
                0.0
            }
            Some(speed) => speed,
            None => 0.0,
        };
        let disconnection_type = rules::classify(
            speed,
            resolution.geofence_name.is_some(),
            self.config.rules.speed_threshold,
        );

        let written = self
            .registers
            .write_if_absent(NewDisconnection {
                vehicle_id: resolution.vehicle.id,
                distributor_id: resolution.distributor.id,
                report_date: today,
                disconnection_type,
                last_connection: resolution.last_connection.unwrap_or(now),
                platform_client: snap.client_name.clone().unwrap_or_default(),
                speed: snap.speed,
                geofence_name: resolution.geofence_name.clone(),
            })
            .await?;

        Ok(RecordOutcome {
            resolution,
            disconnection: Some((disconnection_type, written.created)),
        })
    }

    /// Register service sharing this pipeline's store and policy.
    pub fn registers(&self) -> &RegisterService<S> {
        &self.registers
    }
}
