//! Plutus minting transaction builder: select, draft, evaluate, finalize,
//! sign and submit.

pub mod configuration;
pub mod draft;
pub mod evaluator;
pub mod fees;
pub mod finalizer;
mod http;
pub mod parameters;
pub mod pipeline;
pub mod selector;
pub mod signer;
pub mod submission;
pub mod witness;

pub use configuration::MintConfig;
pub use draft::{DraftBuilder, DraftTransaction};
pub use evaluator::HttpEvaluator;
pub use finalizer::{FinalizedTransaction, RedeemerFinalizer, price_redeemers};
pub use http::ServiceError;
pub use parameters::HttpChainParams;
pub use pipeline::{Collaborators, MintPipeline, MintRequest, PipelineSettings, Stage};
pub use selector::{CollateralRange, InputSelection, Selection, UtxoSelector};
pub use signer::{DualPhaseSigner, SignedTransaction, merge_witnesses, verify_commitment};
pub use submission::WalletSubmitter;
pub use witness::{
    DatumStrategy, EmptyConstr, MintEntry, MintingPolicy, PartialPlutusWitness,
    RequiredSignerList, WitnessAssembler, WitnessContext,
};
