// ============================================================
// Layer 2 — ResumeUseCase
// ============================================================
// Everything that starts from an existing run directory:
//
//   eval     stored accuracies, then a fresh test pass with the
//            confusion matrix and per-class accuracy; the test
//            macro-F1 is written back to log.json as `f1_score`
//   explain  one JSONL line per test example
//   retrain  `rem_epoch` more epochs in the same run directory,
//            continuing the best-slot lineage
//
// All three rehydrate the RunConfig stored in log.json.

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use std::path::{Path, PathBuf};

use crate::application::orchestrator::{Orchestrator, RunSummary};
use crate::data::provider::{DataProvider, JsonlProvider};
use crate::domain::{config::RunConfig, metrics::EvalSummary, traits::Split};
use crate::infra::explanations::JsonlExplainer;
use crate::ml::{resume::ResumePlan, session::open_session};

pub struct ResumeUseCase {
    plan: ResumePlan,
}

impl ResumeUseCase {
    /// `checkpoint` is a run directory or one of its slot files.
    pub fn open(checkpoint: &Path) -> Result<Self> {
        Ok(Self { plan: ResumePlan::locate(checkpoint)? })
    }

    pub fn plan(&self) -> &ResumePlan {
        &self.plan
    }

    pub fn run_dir(&self) -> &Path {
        self.plan.manager.dir()
    }

    pub fn eval<B: AutodiffBackend>(&self, device: &B::Device) -> Result<EvalSummary> {
        let stored = &self.plan.log.best;
        println!(
            "Stored best (epoch {}): train_acc={:.2}% valid_acc={:.2}% test_acc={:.2}%",
            stored.epoch, stored.train_acc, stored.valid_acc, stored.test_acc
        );

        let config = RunConfig { confusion: true, per_class: true, ..self.plan.config() };
        let data = JsonlProvider.load::<B>(&config, device)?;
        let summary = open_session::<B, _>(&config, data, device, Some(&self.plan), |session| {
            session.evaluate(Split::Test)
        })?;

        println!(
            "Test: loss={:.4} acc={:.2}% macro_f1={:.4} weighted_f1={:.4} top{}_acc={:.2}%",
            summary.loss,
            summary.accuracy,
            summary.macro_f1,
            summary.weighted_f1,
            config.top_k,
            summary.top_k_accuracy
        );

        let mut log = self.plan.log.clone();
        log.f1_score = Some(summary.macro_f1);
        self.plan.manager.write_log(&log)?;
        Ok(summary)
    }

    /// Returns the explanations file and the number of lines written.
    pub fn explain<B: AutodiffBackend>(&self, device: &B::Device) -> Result<(PathBuf, usize)> {
        let config = self.plan.config();
        let data = JsonlProvider.load::<B>(&config, device)?;
        let dir = self.run_dir();

        open_session::<B, _>(&config, data, device, Some(&self.plan), |session| {
            let mut explainer = JsonlExplainer::create(dir, session.labels().clone(), config.top_k)?;
            session.explain(Split::Test, &mut explainer)?;
            let path = explainer.path().to_path_buf();
            let written = explainer.finish()?;
            Ok((path, written))
        })
    }

    /// Continue training for `rem_epoch` epochs with a fresh patience budget.
    pub fn retrain<B: AutodiffBackend>(
        &self,
        rem_epoch: usize,
        patience: usize,
        device: &B::Device,
    ) -> Result<RunSummary> {
        let base = self.plan.config();
        let config = RunConfig { nepoch: base.start_epoch + rem_epoch, patience, ..base };
        config.validate()?;

        let data = JsonlProvider.load::<B>(&config, device)?;
        let (best_acc, best_epoch) = self.plan.prior_best();
        let manager = &self.plan.manager;
        let note = &self.plan.log.best.note;

        tracing::info!(
            "Retraining epochs {}..{} (patience {}) from best valid_acc {:.2}%",
            config.start_epoch,
            config.nepoch,
            patience,
            best_acc
        );
        open_session::<B, _>(&config, data, device, Some(&self.plan), |session| {
            Orchestrator::resumed(&config, manager, best_acc, best_epoch)?
                .with_note(note.as_str())
                .run(session)
        })
    }
}
