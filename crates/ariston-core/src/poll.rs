// ── Poll loop ──
//
// A self-rescheduling refresh cycle. The next tick's deadline is fixed
// *before* the fetch runs, from the error count as it stood at the
// start of the cycle -- a slow or failed fetch can therefore never
// stall the schedule, and backoff decisions lag one cycle behind the
// error they react to, exactly like a timer that re-arms itself first.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::plant::Plant;

/// Recurring refresh driver, one per plant. Runs until cancelled; the
/// first cycle fires immediately.
pub(crate) async fn poll_task(plant: Plant, cancel: CancellationToken) {
    loop {
        let next_tick = Instant::now() + plant.next_poll_interval();

        if let Err(error) = plant.refresh_now().await {
            // Poll errors never reach a caller; they only feed the
            // error count and availability.
            warn!(plant = %plant.name(), %error, "periodic refresh failed");
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep_until(next_tick) => {}
        }
    }
}
