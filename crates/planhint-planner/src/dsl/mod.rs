//! Front ends that build join trees and operator assignments from text.

pub mod yaml;
