use rocket::fs::TempFile;
use rocket::http::ContentType;
use rocket::State;
use tokio::io::AsyncReadExt;
use utoipa::ToSchema;

use crate::error::StorageError;
use crate::hub::{Classhub, Upload};
use crate::resp::principal::Principal;
use crate::resp::problem::problems::validation_problem;
use crate::resp::problem::Problem;
use crate::storage::FileRef;

/// Multipart body carrying uploaded files.
#[derive(Debug, FromForm)]
pub struct UploadForm<'r> {
    pub files: Vec<TempFile<'r>>,
}

/// OpenAPI shape of [`UploadForm`].
#[derive(ToSchema)]
pub struct FileUpload {
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<Vec<u8>>,
}

fn upload_name(file: &TempFile<'_>) -> String {
    let name = file.name().unwrap_or("upload");
    match file.content_type().and_then(|it| it.extension()) {
        Some(extension) => format!("{}.{}", name, extension),
        None => name.to_string(),
    }
}

/// Reads multipart files into memory, rejecting any above `limit` bytes.
pub async fn read_uploads(files: &[TempFile<'_>], limit: u64) -> Result<Vec<Upload>, Problem> {
    let mut uploads = Vec::with_capacity(files.len());

    for file in files {
        let name = upload_name(file);
        if file.len() > limit {
            return Err(validation_problem(StorageError::TooLarge {
                name,
                size: file.len(),
                limit,
            }));
        }

        let mut bytes = Vec::with_capacity(file.len() as usize);
        let mut reader = Box::pin(file.open().await?);
        reader.read_to_end(&mut bytes).await?;

        uploads.push(Upload { name, bytes });
    }

    Ok(uploads)
}

/// Download an uploaded file
#[utoipa::path(
    params(
        ("reference", description = "file reference returned with the owning record")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 401, description = "Missing caller identity", body = Problem),
        (status = 404, description = "Unknown file reference", body = Problem),
    ),
    security(("user_id" = []))
)]
#[get("/files/<reference>")]
#[tracing::instrument(skip(hub))]
pub async fn file_get(
    reference: &str,
    _principal: Principal,
    hub: &State<Classhub>,
) -> Result<(ContentType, Vec<u8>), Problem> {
    let reference = FileRef(reference.to_string());

    let bytes = match hub.files().fetch(&reference).await {
        Ok(bytes) => bytes,
        Err(StorageError::UnknownReference(_)) => {
            return Err(crate::error::ClassError::not_found("file").into())
        }
        Err(e) => return Err(e.into()),
    };
    let content_type = reference
        .extension()
        .and_then(ContentType::from_extension)
        .unwrap_or(ContentType::Binary);

    Ok((content_type, bytes))
}
