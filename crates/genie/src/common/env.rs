macro_rules! create_genie_env {
    ($name: literal) => {
        concat!("GENIE_", $name)
    };
}

/// Known environment variables exported into the launch script
pub const GENIE_JOB_ID: &str = create_genie_env!("JOB_ID");
pub const GENIE_JOB_NAME: &str = create_genie_env!("JOB_NAME");
pub const GENIE_JOB_DIR: &str = create_genie_env!("JOB_DIR");
pub const GENIE_USER: &str = create_genie_env!("USER");
pub const GENIE_USER_GROUP: &str = create_genie_env!("USER_GROUP");
pub const GENIE_JOB_VERSION: &str = create_genie_env!("JOB_VERSION");
pub const GENIE_VERSION: &str = create_genie_env!("VERSION");
pub const GENIE_JOB_MEMORY: &str = create_genie_env!("JOB_MEMORY");
pub const GENIE_JOB_CPU: &str = create_genie_env!("JOB_CPU");
pub const GENIE_CLUSTER_ID: &str = create_genie_env!("CLUSTER_ID");
pub const GENIE_CLUSTER_NAME: &str = create_genie_env!("CLUSTER_NAME");
pub const GENIE_CLUSTER_DIR: &str = create_genie_env!("CLUSTER_DIR");
pub const GENIE_COMMAND_ID: &str = create_genie_env!("COMMAND_ID");
pub const GENIE_COMMAND_NAME: &str = create_genie_env!("COMMAND_NAME");
pub const GENIE_COMMAND_DIR: &str = create_genie_env!("COMMAND_DIR");
pub const GENIE_APPLICATION_DIR: &str = create_genie_env!("APPLICATION_DIR");
pub const GENIE_REQUESTED_CLUSTER_TAGS: &str = create_genie_env!("REQUESTED_CLUSTER_TAGS");
pub const GENIE_REQUESTED_COMMAND_TAGS: &str = create_genie_env!("REQUESTED_COMMAND_TAGS");

