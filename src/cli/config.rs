use crate::error::{IngestError, Result};
use crate::settings::{load_settings, save_settings, settings_file_exists, settings_path};

pub fn run(workers: Option<usize>, batch_size: Option<usize>, user: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    let changing = workers.is_some() || batch_size.is_some() || user.is_some();

    if let Some(w) = workers {
        if w == 0 {
            return Err(IngestError::Settings("--workers must be at least 1".to_string()));
        }
        settings.max_parallel_readers = w;
    }
    if let Some(b) = batch_size {
        if b == 0 {
            return Err(IngestError::Settings("--batch-size must be at least 1".to_string()));
        }
        settings.persistence_batch_size = b;
    }
    if let Some(u) = user {
        settings.user_name = u.trim().to_string();
    }
    if changing {
        save_settings(&settings)?;
        println!("Saved {}", settings_path().display());
    } else if !settings_file_exists() {
        println!("No settings file yet; showing defaults.");
    }

    println!("data_dir:                {}", settings.data_dir);
    println!("user_name:               {}", settings.default_user());
    println!("max_parallel_readers:    {}", settings.max_parallel_readers);
    println!("persistence_batch_size:  {}", settings.persistence_batch_size);
    Ok(())
}
