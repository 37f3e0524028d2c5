use std::future;

use tokio::{sync::watch, time::Instant};

/// Caller-side cancellation: an optional deadline, an optional signal, or both.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
	deadline: Option<Instant>,
	signal: Option<watch::Receiver<bool>>,
}
impl Cancellation {
	pub fn none() -> Self {
		Self::default()
	}

	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Cancels once `true` is sent on the channel. A dropped sender never cancels.
	pub fn with_signal(mut self, signal: watch::Receiver<bool>) -> Self {
		self.signal = Some(signal);

		self
	}

	pub fn is_cancelled(&self) -> bool {
		if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
			return true;
		}

		self.signal.as_ref().is_some_and(|signal| *signal.borrow())
	}

	/// Resolves when the deadline passes or the signal fires. Pending forever otherwise.
	pub async fn cancelled(&self) {
		let deadline = async {
			match self.deadline {
				Some(deadline) => tokio::time::sleep_until(deadline).await,
				None => future::pending::<()>().await,
			}
		};
		let signal = async {
			let Some(mut signal) = self.signal.clone() else {
				return future::pending::<()>().await;
			};

			let fired = signal.wait_for(|cancelled| *cancelled).await.is_ok();

			if !fired {
				future::pending::<()>().await;
			}
		};

		tokio::select! {
			_ = deadline => {},
			_ = signal => {},
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[tokio::test]
	async fn signal_cancels() {
		let (tx, rx) = watch::channel(false);
		let cancel = Cancellation::none().with_signal(rx);

		assert!(!cancel.is_cancelled());

		tx.send(true).expect("receiver alive");

		assert!(cancel.is_cancelled());

		tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
			.await
			.expect("cancellation resolves");
	}

	#[tokio::test]
	async fn past_deadline_is_cancelled() {
		let cancel = Cancellation::none().with_deadline(Instant::now());

		assert!(cancel.is_cancelled());

		tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
			.await
			.expect("cancellation resolves");
	}

	#[tokio::test]
	async fn no_trigger_never_resolves() {
		let cancel = Cancellation::none();

		assert!(!cancel.is_cancelled());
		assert!(
			tokio::time::timeout(Duration::from_millis(20), cancel.cancelled()).await.is_err()
		);
	}
}
