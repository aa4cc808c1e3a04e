//! IPA signing endpoint.

use axum::{
    extract::{
        State,
        multipart::{Multipart, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use ipasign_core::{
    models::{
        InputRole, PASSWORD_FIELD, RequestId, SigningInputs, SigningInputsBuilder, UploadedFile,
    },
    workspace::RequestWorkspace,
};

use crate::error::ApiError;
use crate::state::AppState;

/// File name the signed archive is delivered under.
pub const SIGNED_DOWNLOAD_NAME: &str = "signed-ipa.ipa";

/// Sign an IPA with an uploaded certificate and provisioning profile.
///
/// POST /sign-ipa
///
/// Multipart fields: `ipaFile`, `p12File`, `mobileProvision` (files) and
/// `password` (text). Responds with the signed archive as an attachment.
pub async fn sign_ipa(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let inputs = read_signing_inputs(multipart?).await?;

    let request_id = RequestId::new();
    tracing::info!(
        "Signing request {}: archive={} certificate={} profile={}",
        request_id,
        inputs.archive.file_name,
        inputs.certificate.file_name,
        inputs.profile.file_name
    );

    let mut workspace =
        RequestWorkspace::create(&state.config.upload_dir, request_id, state.config.cleanup)
            .await?;

    let result = match workspace.persist(inputs).await {
        Ok(job) => state.pipeline.run(&job).await,
        Err(e) => Err(e),
    };

    let signed = match result {
        Ok(signed) => signed,
        Err(e) => {
            tracing::warn!("Signing request {} failed", request_id);
            workspace.mark_failed();
            return Err(e.into());
        }
    };

    if let Err(e) = workspace.release().await {
        tracing::error!("Failed to release workspace of request {}: {}", request_id, e);
    }

    tracing::info!(
        "Signing request {} succeeded ({} bytes)",
        request_id,
        signed.bytes.len()
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", SIGNED_DOWNLOAD_NAME),
            ),
        ],
        signed.bytes,
    )
        .into_response())
}

/// Reads the multipart body into validated inputs.
///
/// Nothing touches the disk until all four inputs are known to be present.
async fn read_signing_inputs(mut multipart: Multipart) -> Result<SigningInputs, ApiError> {
    let mut builder = SigningInputsBuilder::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == PASSWORD_FIELD {
            let password = field.text().await?;
            builder.password(password)?;
            continue;
        }

        match InputRole::from_field_name(&name) {
            Some(role) => {
                let file_name = field.file_name().map(str::to_owned);
                let data = field.bytes().await?;
                builder.file(role, UploadedFile::new(role, file_name.as_deref(), data))?;
            }
            None => {
                tracing::debug!("Ignoring unknown multipart field: {}", name);
            }
        }
    }

    Ok(builder.build()?)
}
