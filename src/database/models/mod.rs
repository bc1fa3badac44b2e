pub mod principal;
pub mod task;

pub use principal::{Student, Teacher};
pub use task::{SolutionDetail, TaskDetail, TaskOverview, TaskRef, TaskType};
