//! Signal decision pipeline
//!
//! ## Flow (per analysed match)
//!
//! 1. `combiner` - run the predictors, collect `PredictionResult`s
//! 2. `multi_leg` - search non-conflicting leg combinations per risk tier
//! 3. `value_filter` - EV / Kelly gate on the best single and the combination
//! 4. `emitter` - package the accepted candidate into a `Signal`
//!
//! `pipeline::SignalPipeline::run_cycle` drives all four for one match id.

pub mod combiner;
pub mod emitter;
pub mod multi_leg;
pub mod pipeline;
pub mod value_filter;

pub use combiner::{Candidate, CandidateKind, Decision, DecisionCombiner, SkippedPredictor};
pub use emitter::{render_message, SignalEmitter};
pub use multi_leg::MultiLegGenerator;
pub use pipeline::{Evaluation, SignalPipeline};
pub use value_filter::{
    expected_value, implied_probability, kelly_fraction, risk_score, ValueFilter, ValueInput,
};
