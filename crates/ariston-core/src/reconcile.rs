// ── Write reconciliation ──
//
// Merges queued parameter changes into a copy of the latest snapshot
// and pushes the result to the backend as the before/after pair it
// expects. A value stays queued until a later read proves it took
// effect; failed or unconfirmed batches are reconciled again on a
// one-shot timer, a bounded number of times, after which they are
// quietly abandoned.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use ariston_api::PlantUpdate;

use crate::error::CoreError;
use crate::plant::Plant;
use crate::store::SyncState;

/// Fallback for an absent or unusable override end time.
const DEFAULT_DEROGA_TIME: &str = "00:00";

/// One reconciliation step. `apply_parameters` runs it synchronously
/// for the initial attempt; armed retries run it from their own timer
/// task and swallow the result.
pub(crate) fn reconcile<'a>(
    plant: &'a Plant,
) -> Pin<Box<dyn Future<Output = Result<(), CoreError>> + Send + 'a>> {
    // A concrete boxed return type (rather than an `async fn`'s opaque
    // `impl Future`) breaks the auto-trait inference cycle created by the
    // indirect recursion `reconcile` -> `arm_retry_or_abandon` ->
    // `tokio::spawn(reconcile)`.
    Box::pin(reconcile_inner(plant))
}

async fn reconcile_inner(plant: &Plant) -> Result<(), CoreError> {
    // Login happens before the data region is entered; a failure here is
    // handled like any other unreachable-backend condition below.
    let login = plant.inner.client.ensure_logged_in().await;
    if let Err(ref error) = login {
        warn!(plant = %plant.name(), %error, "login failed ahead of a write");
    }

    let mut sync = plant.inner.sync.lock().await;

    // An initial attempt gets a fresh retry budget; a scheduled retry
    // consumes its armed flag so a new timer may be set further down.
    if sync.fresh_request {
        sync.fresh_request = false;
        sync.retries_used = 0;
    } else {
        sync.retry_armed = false;
    }

    let plant_id = login.ok().filter(|_| plant.is_available());
    let (Some(plant_id), Some(snapshot)) = (plant_id, sync.snapshot.clone()) else {
        arm_retry_or_abandon(plant, &mut sync).await;
        warn!(plant = %plant.name(), "no stable connection to set the data");
        return Err(CoreError::Communication {
            message: "no stable connection to set the data".into(),
        });
    };

    // The backend wants the document twice, and it only accepts the
    // override end time in 24-hour form, so both copies are normalized
    // before anything else happens.
    let mut new_value = snapshot.clone();
    let mut old_value = snapshot;
    let deroga = normalize_deroga_time(new_value.zone.deroga_until.as_ref());
    new_value.zone.deroga_until = Some(Value::String(deroga.clone()));
    old_value.zone.deroga_until = Some(Value::String(deroga));

    let confirmed = sync.confirmed_by_read();
    let mut changed = false;

    // Each queued value either overwrites the outgoing copy, is dropped
    // as confirmed by a read, or is held as still in flight.
    if let Some(mode) = sync.pending.mode {
        if new_value.mode == mode {
            if confirmed {
                sync.pending.mode = None;
            } else {
                changed = true;
            }
        } else {
            new_value.mode = mode;
            changed = true;
        }
    }
    if let Some(temperature) = sync.pending.dhw_set_temperature {
        if (new_value.dhw_temp.value - temperature).abs() < f64::EPSILON {
            if confirmed {
                sync.pending.dhw_set_temperature = None;
            } else {
                changed = true;
            }
        } else {
            new_value.dhw_temp.value = temperature;
            changed = true;
        }
    }
    if let Some(temperature) = sync.pending.ch_set_temperature {
        if (new_value.zone.comfort_temp.value - temperature).abs() < f64::EPSILON {
            if confirmed {
                sync.pending.ch_set_temperature = None;
            } else {
                changed = true;
            }
        } else {
            new_value.zone.comfort_temp.value = temperature;
            changed = true;
        }
    }
    if let Some(mode) = sync.pending.ch_mode {
        if new_value.zone.mode.value == mode {
            if confirmed {
                sync.pending.ch_mode = None;
            } else {
                changed = true;
            }
        } else {
            new_value.zone.mode.value = mode;
            changed = true;
        }
    }

    if !changed {
        debug!(plant = %plant.name(), "nothing differs from the dashboard, no transmission");
        return Ok(());
    }

    // The retry decision is made before transmitting: the attempt about
    // to happen may fail, and by then it is too late to arm anything.
    arm_retry_or_abandon(plant, &mut sync).await;

    sync.write_start = Some(Instant::now());
    let update = PlantUpdate {
        new_value,
        old_value,
    };
    match plant.inner.client.set_plant_data(&plant_id, &update).await {
        Ok(echoed) => {
            sync.write_end = Some(Instant::now());
            // The echo is the freshest view of the document, though the
            // backend sometimes echoes values it has not actually
            // applied; queued entries stay until a read confirms them.
            sync.snapshot = Some(echoed);
            info!(plant = %plant.name(), "changed data submitted");
            Ok(())
        }
        Err(error) => {
            warn!(plant = %plant.name(), %error, "command to set data failed");
            Err(error.into())
        }
    }
}

/// Arm the one-shot retry timer if budget remains, or abandon every
/// queued value. Exhaustion raises no error; the values will simply
/// never be confirmed. A no-op while a retry is already armed.
async fn arm_retry_or_abandon(plant: &Plant, sync: &mut SyncState) {
    if sync.retry_armed {
        return;
    }
    if sync.retries_used < plant.inner.config.max_set_retries {
        sync.retries_used += 1;
        sync.retry_armed = true;
        let delay = plant.inner.config.set_retry_delay;
        debug!(
            plant = %plant.name(),
            retry = sync.retries_used,
            delay = ?delay,
            "write retry armed"
        );

        let retry_plant = plant.clone();
        let cancel = plant.inner.cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    // A scheduled retry has no caller waiting on it;
                    // failures are logged and swallowed.
                    if let Err(error) = reconcile(&retry_plant).await {
                        warn!(
                            plant = %retry_plant.name(),
                            %error,
                            "scheduled write retry failed"
                        );
                    }
                }
            }
        });
        plant.inner.retry_handles.lock().await.push(handle);
    } else {
        info!(plant = %plant.name(), "retry budget exhausted, abandoning pending changes");
        sync.pending.clear();
    }
}

/// Convert the override end time to 24-hour form if it is in 12-hour
/// form.
///
/// The rules mirror the dashboard's own quirks and are preserved
/// as-is: the PM branch concatenates hour+12 with the raw minutes and
/// no colon ("12:30 PM" becomes "2430"), and a string with no space at
/// all falls back to the default rather than passing through.
pub(crate) fn normalize_deroga_time(raw: Option<&Value>) -> String {
    let raw = match raw {
        Some(Value::String(s)) => s.as_str(),
        _ => DEFAULT_DEROGA_TIME,
    };

    let tokens: Vec<&str> = raw.split(' ').collect();
    match tokens.get(1).copied() {
        Some("AM") => {
            if tokens[0] == "12:00" {
                "00:00".to_owned()
            } else {
                tokens[0].to_owned()
            }
        }
        Some("PM") => {
            if tokens[0] == "12:00" {
                "12:00".to_owned()
            } else {
                let parts: Vec<&str> = tokens[0].split(':').collect();
                match (parts.first().and_then(|h| h.parse::<i64>().ok()), parts.get(1)) {
                    (Some(hour), Some(minutes)) => format!("{}{minutes}", hour + 12),
                    _ => DEFAULT_DEROGA_TIME.to_owned(),
                }
            }
        }
        Some(_) => {
            // No AM/PM marker after the space: pass the whole string
            // through as long as it splits into an hour and a minute.
            let parts: Vec<&str> = raw.split(':').collect();
            match (parts.first(), parts.get(1)) {
                (Some(hour), Some(minutes)) if !hour.is_empty() && !minutes.is_empty() => {
                    raw.to_owned()
                }
                _ => DEFAULT_DEROGA_TIME.to_owned(),
            }
        }
        None => DEFAULT_DEROGA_TIME.to_owned(),
    }
}
