// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Completion-callback adapter over the async evaluation API.

use loom_toggles_core::EvaluationRequest;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::client::TogglesClient;
use crate::error::Result;

impl TogglesClient {
	/// Evaluates `request` on the client's runtime and hands the outcome to
	/// `callback`.
	///
	/// The callback always runs on a spawned task, never inside this call,
	/// even when the value is already cached. The returned handle can be
	/// awaited or dropped; dropping it does not cancel the evaluation.
	pub fn evaluate_with_callback<F>(&self, request: EvaluationRequest, callback: F) -> JoinHandle<()>
	where
		F: FnOnce(Result<Value>) + Send + 'static,
	{
		let client = self.clone();
		self.runtime().spawn(async move {
			let result = client.evaluate(&request).await;
			callback(result);
		})
	}
}
