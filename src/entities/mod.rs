pub mod attendance;
pub mod client_access;
pub mod department;
pub mod employee;
pub mod employee_reward;
pub mod hr_query;
pub mod key_result;
pub mod leave_request;
pub mod mood_entry;
pub mod okr;
pub mod payroll;
pub mod performance_feedback;
pub mod project;
pub mod project_member;
pub mod rag_update;
pub mod salary;
pub mod task;
pub mod task_comment;
pub mod task_reward;
pub mod user;
