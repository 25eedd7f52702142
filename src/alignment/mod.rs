pub mod expansion;
pub mod likelihood;
pub mod mask;
pub mod projection;
pub mod report;
pub mod search;
