pub mod plan_generation;
