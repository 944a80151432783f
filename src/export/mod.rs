//! Export of materialised terrain chunks

pub mod glb;
