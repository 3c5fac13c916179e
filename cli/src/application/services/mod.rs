//! Application services: use-case orchestration.
//!
//! Each service module implements one stage of the image build by composing
//! domain logic with port trait calls. Services import only from
//! `crate::domain` and `crate::application::ports`, never from
//! `crate::infra` or `crate::output`.

pub mod acquire;
pub mod build;
pub mod cloud_init;
pub mod finalize;
pub mod guest_setup;
pub mod materialize;
pub mod preflight;
pub mod steps;
