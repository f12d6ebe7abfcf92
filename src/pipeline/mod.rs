//! Pipeline stages for website ad-placement analysis.
//!
//! Each submodule implements exactly one stage. Keeping stages separate
//! makes each independently testable and lets the capability-backed ones
//! (capture, vision) swap implementations without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! normalize ──▶ probe ──▶ capture ──▶ optimize ──▶ vision ──┐
//! (url repair)  (HEAD)    (browser)   (≤ 5 MB)    (zones)   ├─▶ compose
//!                            scrape ───────────▶ (contact) ─┘   (proposal)
//! ```
//!
//! 1. [`normalize`] — canonicalise the user string into an absolute URL
//! 2. [`probe`]     — cheap reachability pre-check before browser launch
//! 3. [`capture`]   — drive the browser capability with bounded retries;
//!    [`chromium`] is the bundled engine implementation
//! 4. [`optimize`]  — keep the screenshot under the inference byte budget
//! 5. [`vision`]    — zone classification via the inference capability
//! 6. [`scrape`]    — contact/company extraction, concurrent with vision
//! 7. [`compose`]   — research + proposal generation, degradation-only

pub mod capture;
pub mod chromium;
pub mod compose;
pub mod normalize;
pub mod optimize;
pub mod probe;
pub mod scrape;
pub mod vision;
