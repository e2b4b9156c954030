pub mod job_store;
pub mod material_store;
pub mod memory_job_store;
pub mod memory_material_store;
pub mod pg_job_store;
pub mod pg_material_store;

pub use job_store::{JobAdmission, JobStore};
pub use material_store::MaterialStore;
pub use memory_job_store::InMemoryJobStore;
pub use memory_material_store::InMemoryMaterialStore;
pub use pg_job_store::PgJobStore;
pub use pg_material_store::PgMaterialStore;
