//! Station identification — scheduling and announcement audio.
//!
//! [`IdentScheduler`] answers *when* to identify; [`AnnouncementSource`]
//! answers *what* to play (the transcoded clip, or a fallback tone when the
//! clip is unusable).  The relay state machine decides *whether* an
//! identification may start, since it must not interrupt a receive or
//! transmit in progress.

pub mod scheduler;
pub mod source;

pub use scheduler::IdentScheduler;
pub use source::{
    cap_samples, chunks_from_samples, transcode_clip, AnnouncementSource, TranscodeError,
    MAX_ANNOUNCEMENT_SECS,
};
