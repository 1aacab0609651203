mod plan_repo;

pub use plan_repo::PlanRepo;
