use std::path::Path;

use analytics_client::api::{DatasetUpload, RecipeUpdate, RunRequest, StatsRequest};
use analytics_client::{AnalyticsClient, ClientConfig, Job, JobStatus, User};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::{DatasetCommands, RecipeCommands};
use crate::error::{CliError, Result};
use crate::output::OutputManager;

/// Email and password for this invocation.
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Use what was given, prompting for whatever is missing.
    pub fn resolve(email: Option<String>, password: Option<String>) -> Result<Self> {
        let email = match email.filter(|e| !e.trim().is_empty()) {
            Some(email) => email,
            None => prompt_email()?,
        };
        let password = match password.filter(|p| !p.is_empty()) {
            Some(password) => password,
            None => prompt_password(&email)?,
        };
        Ok(Self { email, password })
    }
}

#[cfg(feature = "interactive")]
fn prompt_email() -> Result<String> {
    Ok(inquire::Text::new("Email:").prompt()?)
}

#[cfg(not(feature = "interactive"))]
fn prompt_email() -> Result<String> {
    Err(CliError::MissingCredential("email"))
}

#[cfg(feature = "interactive")]
fn prompt_password(email: &str) -> Result<String> {
    Ok(inquire::Password::new(&format!("Password for {email}:"))
        .without_confirmation()
        .prompt()?)
}

#[cfg(not(feature = "interactive"))]
fn prompt_password(_email: &str) -> Result<String> {
    Err(CliError::MissingCredential("password"))
}

/// Parse a JSON argument; `@path` reads it from a file.
pub async fn parse_json_arg(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => raw.to_owned(),
    };
    serde_json::from_str(&text)
        .map_err(|e| CliError::InvalidInput(format!("`{raw}` is not valid JSON: {e}")))
}

async fn stats_request(columns: Vec<String>, filters: Option<&str>) -> Result<StatsRequest> {
    let filters = match filters {
        Some(raw) => Some(parse_json_arg(raw).await?),
        None => None,
    };
    Ok(StatsRequest {
        columns: (!columns.is_empty()).then_some(columns),
        filters,
        ..StatsRequest::default()
    })
}

pub struct CommandExecutor {
    client: AnalyticsClient,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(config: ClientConfig, output: OutputManager) -> Result<Self> {
        Ok(Self {
            client: AnalyticsClient::from_config(config)?,
            output,
        })
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        let user = self
            .client
            .session()
            .login(&credentials.email, &credentials.password)
            .await?;
        debug!(user_id = user.id, "logged in");
        Ok(user)
    }

    pub async fn whoami(&self) -> Result<()> {
        let user = self.client.session().me().await?;
        self.output.print(&user)
    }

    pub fn print_user(&self, user: &User) -> Result<()> {
        self.output.print(user)
    }

    /// End the backend session. Failures are only logged: the command's own
    /// result is what the user asked for.
    pub async fn logout(&self) {
        if let Err(e) = self.client.session().logout().await {
            warn!(error = %e, "logout failed");
        }
    }

    pub async fn datasets(&self, command: DatasetCommands) -> Result<()> {
        match command {
            DatasetCommands::List => self.output.print(&self.client.list_datasets().await?),
            DatasetCommands::Upload {
                file,
                title,
                description,
            } => {
                let upload = read_upload(&file, title, description).await?;
                let dataset = self.client.upload_dataset(upload).await?;
                self.output.print(&dataset)
            }
            DatasetCommands::Delete { id } => {
                self.client.delete_dataset(id).await?;
                info!(dataset_id = id, "dataset deleted");
                Ok(())
            }
            DatasetCommands::Preview { id, rows } => {
                self.output.print(&self.client.dataset_preview(id, rows).await?)
            }
            DatasetCommands::Schema { id, search } => {
                let schema = self.client.dataset_schema(id).await?;
                match search {
                    Some(needle) => self.output.print(&schema.search(&needle)),
                    None => self.output.print(&schema),
                }
            }
        }
    }

    pub async fn recipes(&self, command: RecipeCommands) -> Result<()> {
        match command {
            RecipeCommands::List { dataset } => {
                self.output.print(&self.client.list_recipe_templates(dataset).await?)
            }
            RecipeCommands::Save {
                dataset,
                name,
                panels,
            } => {
                let panels = parse_json_arg(&panels).await?;
                let recipe = self.client.save_recipe(dataset, &name, panels).await?;
                self.output.print(&recipe)
            }
            RecipeCommands::Update { id, name, panels } => {
                let panels = match panels {
                    Some(raw) => Some(parse_json_arg(&raw).await?),
                    None => None,
                };
                let update = RecipeUpdate { name, panels };
                if update == RecipeUpdate::default() {
                    return Err(CliError::InvalidInput(
                        "nothing to update; pass --name and/or --panels".into(),
                    ));
                }
                self.output.print(&self.client.update_recipe(id, &update).await?)
            }
            RecipeCommands::Delete { id } => {
                self.client.delete_recipe(id).await?;
                info!(recipe_id = id, "recipe deleted");
                Ok(())
            }
        }
    }

    /// Submit a run and wait for it; a failed run is printed and then
    /// reported as an error.
    pub async fn run(
        &self,
        dataset: i64,
        recipe: String,
        params: &str,
        token: &CancellationToken,
    ) -> Result<()> {
        let request = RunRequest::new(recipe, parse_json_arg(params).await?);
        let job = self.client.run_analysis(dataset, &request, token).await?;
        self.output.print(&job)?;
        check_run(&job)
    }

    pub async fn correlation(&self, dataset: i64, columns: Vec<String>, filters: Option<&str>) -> Result<()> {
        let request = stats_request(columns, filters).await?;
        self.output.print(&self.client.correlation(dataset, &request).await?)
    }

    pub async fn pca(
        &self,
        dataset: i64,
        columns: Vec<String>,
        filters: Option<&str>,
        components: Option<u32>,
    ) -> Result<()> {
        let mut request = stats_request(columns, filters).await?;
        if let Some(n) = components {
            request = request.option("n_components", n);
        }
        self.output.print(&self.client.pca(dataset, &request).await?)
    }

    pub async fn chart(&self, dataset: i64, panel: &str) -> Result<()> {
        let panel = parse_json_arg(panel).await?;
        self.output.print(&self.client.chart(dataset, &panel).await?)
    }
}

fn check_run(job: &Job) -> Result<()> {
    match job.status {
        JobStatus::Failed => Err(CliError::RunFailed {
            id: job.id.to_string(),
            message: job
                .error_message
                .clone()
                .unwrap_or_else(|| "no error message".to_owned()),
        }),
        _ => Ok(()),
    }
}

async fn read_upload(
    file: &Path,
    title: Option<String>,
    description: Option<String>,
) -> Result<DatasetUpload> {
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CliError::InvalidInput(format!("`{}` is not a file", file.display())))?
        .to_owned();
    let bytes = tokio::fs::read(file).await?;
    let title = title.unwrap_or_else(|| {
        file_name
            .split_once('.')
            .map_or(file_name.as_str(), |(stem, _)| stem)
            .to_owned()
    });
    Ok(DatasetUpload {
        title,
        description,
        file_name,
        bytes: bytes.into(),
    })
}
