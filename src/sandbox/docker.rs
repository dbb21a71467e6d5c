use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, WaitContainerOptions,
};
use bollard::image::{BuildImageOptions, ListImagesOptions, RemoveImageOptions};
use bollard::service::HostConfig;
use bollard::Docker;
use bytes::Bytes;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tar::{Builder, Header};
use tracing::{debug, info, warn};

use super::{CodeSandbox, SandboxError, SandboxOutput, MANAGED_LABEL};
use crate::config::{NetworkPolicy, SandboxConfig};
use crate::templates;

/// Runs payloads in freshly built Docker images
pub(crate) struct DockerSandbox {
    config: SandboxConfig,
}

impl DockerSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Render the Dockerfile for the configured runtime.
    pub(crate) fn render_dockerfile(&self) -> String {
        templates::DOCKERFILE
            .replace("{{base_image}}", &self.config.base_image)
            .replace("{{dependency}}", &self.config.dependency)
            .replace("{{workdir}}", &self.config.workdir)
            .replace("{{script_name}}", &self.config.script_name)
            .replace("{{interpreter}}", &self.config.interpreter)
    }

    /// Build an in-memory tar build context holding the Dockerfile and payload.
    pub(crate) fn build_context(&self, payload: &str) -> Result<Bytes, SandboxError> {
        let dockerfile = self.render_dockerfile();

        let mut tar = Builder::new(Vec::new());
        append_file(&mut tar, "Dockerfile", dockerfile.as_bytes())
            .and_then(|()| append_file(&mut tar, &self.config.script_name, payload.as_bytes()))
            .map_err(|e| SandboxError::build_failed(format!("failed to write build context: {e}")))?;
        let buf = tar
            .into_inner()
            .map_err(|e| SandboxError::build_failed(format!("failed to finalize build context: {e}")))?;

        Ok(Bytes::from(buf))
    }

    async fn build_image(
        &self,
        docker: &Docker,
        tag: &str,
        context: Bytes,
    ) -> Result<(), SandboxError> {
        let build_options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.to_string(),
            rm: true,
            forcerm: true,
            labels: managed_labels(),
            ..Default::default()
        };

        let mut stream = docker.build_image(build_options, None, Some(context));

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(output) => {
                    if let Some(stream_text) = &output.stream {
                        let trimmed = stream_text.trim();
                        if !trimmed.is_empty() {
                            debug!("build: {}", trimmed);
                        }
                    } else if let Some(error) = &output.error {
                        return Err(SandboxError::build_failed(error.trim()));
                    } else if let Some(message) =
                        output.error_detail.as_ref().and_then(|d| d.message.as_ref())
                    {
                        return Err(SandboxError::build_failed(message.trim()));
                    }
                }
                Err(e) => return Err(SandboxError::build_failed(e.to_string())),
            }
        }

        Ok(())
    }

    fn container_config(
        &self,
        image: &str,
        cmd: Option<Vec<String>>,
    ) -> Result<ContainerConfig<String>, SandboxError> {
        let resources = &self.config.resources;
        let memory = parse_memory_limit(&resources.memory)?;
        let cpus = resources.cpus.parse::<f64>().unwrap_or(2.0);

        #[allow(clippy::cast_possible_truncation)]
        let mut host_config = HostConfig {
            memory: Some(memory),
            nano_cpus: Some((cpus * 1_000_000_000.0) as i64),
            ..Default::default()
        };

        if self.config.network == NetworkPolicy::Deny {
            host_config.network_mode = Some("none".to_string());
        }

        Ok(ContainerConfig {
            image: Some(image.to_string()),
            cmd,
            labels: Some(managed_labels()),
            host_config: Some(host_config),
            ..Default::default()
        })
    }

    /// Create, start and wait for a container, then remove it.
    async fn run_container(
        &self,
        docker: &Docker,
        image: &str,
        cmd: Option<Vec<String>>,
    ) -> Result<SandboxOutput, SandboxError> {
        let container_name = format!("proofrun-{}", short_id());
        let container_config = self.container_config(image, cmd)?;

        debug!("Creating container: {}", container_name);
        docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container_name.clone(),
                    platform: None,
                }),
                container_config,
            )
            .await
            .map_err(|e| SandboxError::container_failed(format!("failed to create container: {e}")))?;

        let result = self.run_to_completion(docker, &container_name).await;

        debug!("Removing container");
        if let Err(e) = docker
            .remove_container(
                &container_name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            warn!("Failed to remove container {}: {}", container_name, e);
        }

        result
    }

    async fn run_to_completion(
        &self,
        docker: &Docker,
        container_name: &str,
    ) -> Result<SandboxOutput, SandboxError> {
        debug!("Starting container");
        docker
            .start_container::<String>(container_name, None)
            .await
            .map_err(|e| SandboxError::container_failed(format!("failed to start container: {e}")))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let exit_code = if let Ok(code) =
            tokio::time::timeout(timeout, wait_for_exit(docker, container_name)).await
        {
            code?
        } else {
            warn!(
                "Container {} exceeded {}s, killing it",
                container_name, self.config.timeout_secs
            );
            if let Err(e) = docker.kill_container::<String>(container_name, None).await {
                debug!("Container {} not killed: {}", container_name, e);
            }
            let partial = match collect_logs(docker, container_name).await {
                Ok(output) => output,
                Err(e) => {
                    debug!("No logs from timed out container {}: {}", container_name, e);
                    String::new()
                }
            };
            return Err(SandboxError::timeout(timeout, partial));
        };

        let output = collect_logs(docker, container_name).await?;
        debug!("Container exited with status {}", exit_code);

        Ok(SandboxOutput {
            output,
            exit_code,
            library_version: None,
        })
    }

    /// Ask pip inside the image which version of the dependency it installed.
    async fn probe_version(&self, docker: &Docker, image: &str) -> Option<String> {
        let cmd = vec![
            "pip".to_string(),
            "show".to_string(),
            self.config.dependency.clone(),
        ];
        match self.run_container(docker, image, Some(cmd)).await {
            Ok(out) if out.succeeded() => parse_pip_version(&out.output),
            Ok(out) => {
                debug!("pip show exited with {}", out.exit_code);
                None
            }
            Err(e) => {
                warn!("Failed to probe {} version: {}", self.config.dependency, e);
                None
            }
        }
    }

    async fn run_program(&self, docker: &Docker, tag: &str) -> Result<SandboxOutput, SandboxError> {
        info!("Running sandbox container");
        let mut output = self.run_container(docker, tag, None).await?;

        if output.succeeded() && self.config.probe_version {
            output.library_version = self.probe_version(docker, tag).await;
        }

        Ok(output)
    }
}

#[async_trait]
impl CodeSandbox for DockerSandbox {
    fn name(&self) -> &'static str {
        "Docker"
    }

    async fn execute(&self, payload: &str) -> Result<SandboxOutput, SandboxError> {
        let docker = connect().await?;
        let tag = format!("proofrun-{}:latest", short_id());
        let context = self.build_context(payload)?;

        info!("Building sandbox image {}", tag);
        let result = match self.build_image(&docker, &tag, context).await {
            Ok(()) => self.run_program(&docker, &tag).await,
            Err(e) => Err(e),
        };

        if let Err(e) = docker
            .remove_image(
                &tag,
                Some(RemoveImageOptions {
                    force: true,
                    ..Default::default()
                }),
                None,
            )
            .await
        {
            debug!("Image {} not removed: {}", tag, e);
        }

        result
    }

    async fn cleanup_orphaned(&self) -> Result<u32, SandboxError> {
        let docker = connect().await?;
        let filters = HashMap::from([("label".to_string(), vec![format!("{MANAGED_LABEL}=true")])]);
        let mut removed = 0;

        let containers = docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters: filters.clone(),
                ..Default::default()
            }))
            .await?;

        for container in containers {
            let Some(id) = container.id else { continue };
            match docker
                .remove_container(
                    &id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await
            {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove container {}: {}", id, e),
            }
        }

        let images = docker
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                filters,
                ..Default::default()
            }))
            .await?;

        for image in images {
            match docker
                .remove_image(
                    &image.id,
                    Some(RemoveImageOptions {
                        force: true,
                        ..Default::default()
                    }),
                    None,
                )
                .await
            {
                Ok(_) => removed += 1,
                Err(e) => warn!("Failed to remove image {}: {}", image.id, e),
            }
        }

        info!("Removed {} orphaned sandbox objects", removed);
        Ok(removed)
    }
}

async fn connect() -> Result<Docker, SandboxError> {
    let docker = Docker::connect_with_local_defaults()
        .map_err(|e| SandboxError::docker_unavailable(e.to_string()))?;

    docker
        .ping()
        .await
        .map_err(|e| SandboxError::docker_unavailable(format!("cannot ping daemon: {e}")))?;

    Ok(docker)
}

async fn wait_for_exit(docker: &Docker, container_name: &str) -> Result<i64, SandboxError> {
    let mut stream = docker.wait_container(
        container_name,
        Some(WaitContainerOptions {
            condition: "not-running",
        }),
    );

    match stream.next().await {
        Some(Ok(response)) => Ok(response.status_code),
        // bollard surfaces non-zero exits as an error carrying the status
        Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
        Some(Err(e)) => Err(SandboxError::container_failed(format!(
            "failed waiting for container: {e}"
        ))),
        None => Err(SandboxError::unexpected(
            "wait stream ended without an exit status",
        )),
    }
}

async fn collect_logs(docker: &Docker, container_name: &str) -> Result<String, SandboxError> {
    let mut stream = docker.logs(
        container_name,
        Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        }),
    );

    let mut output = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message },
            ) => {
                output.push_str(&String::from_utf8_lossy(&message));
            }
            Ok(LogOutput::StdIn { .. }) => {}
            Err(e) => {
                return Err(SandboxError::unexpected(format!(
                    "failed to read container logs: {e}"
                )))
            }
        }
    }

    Ok(output)
}

fn append_file(tar: &mut Builder<Vec<u8>>, path: &str, data: &[u8]) -> std::io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    tar.append_data(&mut header, path, data)
}

fn managed_labels() -> HashMap<String, String> {
    HashMap::from([(MANAGED_LABEL.to_string(), "true".to_string())])
}

fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// Extract the `Version:` field from `pip show` output.
fn parse_pip_version(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("Version:"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse memory limit string (e.g., "2g", "512m") to bytes
fn parse_memory_limit(limit: &str) -> Result<i64, SandboxError> {
    let limit = limit.trim().to_lowercase();
    let invalid = || SandboxError::unexpected(format!("Invalid memory limit: {limit}"));

    if let Some(num) = limit.strip_suffix('g') {
        let gigs: i64 = num.parse().map_err(|_| invalid())?;
        Ok(gigs * 1024 * 1024 * 1024)
    } else if let Some(num) = limit.strip_suffix('m') {
        let megs: i64 = num.parse().map_err(|_| invalid())?;
        Ok(megs * 1024 * 1024)
    } else {
        limit.parse().map_err(|_| invalid())
    }
}
