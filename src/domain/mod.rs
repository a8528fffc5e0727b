// Domain layer - project model consumed at the UI boundary

pub mod model;
