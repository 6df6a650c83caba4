use glob::glob;
use std::{
    error::Error,
    io,
    path::Path,
    process::{Command, Output},
};

type Result<T, E = Box<dyn Error>> = std::result::Result<T, E>;

const SHADER_COMPILER_NAME: &str = "glslangValidator";
const SHADER_DIRECTORY: &str = "../../../../assets/shaders";

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed={}", SHADER_DIRECTORY);
    compile_shaders(&format!("{}/*.glsl", SHADER_DIRECTORY))
}

fn compile_shaders(shader_glob: &str) -> Result<()> {
    for entry in glob(shader_glob)? {
        if let Ok(shader_path) = entry {
            println!("cargo:rerun-if-changed={}", shader_path.display());
            if !compile_shader(&shader_path)? {
                break;
            }
        }
    }
    Ok(())
}

/// Returns false when the compiler is missing, so the remaining shaders are skipped.
fn compile_shader(shader_path: &Path) -> Result<bool> {
    let parent_name = shader_path
        .parent()
        .ok_or("Failed to get shader parent directory name")?;

    let file_name = shader_path.file_name().ok_or("Failed to get file_name")?;

    let output_name = file_name
        .to_str()
        .ok_or("Failed to convert file_name os_str to string")?
        .replace("glsl", "spv");

    let result = Command::new(SHADER_COMPILER_NAME)
        .current_dir(&parent_name)
        .arg("-V")
        .arg(&file_name)
        .arg("-o")
        .arg(&output_name)
        .output();

    Ok(display_result(&output_name, result))
}

fn display_result(output_name: &str, result: io::Result<Output>) -> bool {
    match result {
        Ok(output) if !output.status.success() => {
            println!(
                "cargo:warning=Failed to compile {}: {}",
                output_name,
                String::from_utf8_lossy(&output.stdout).trim()
            );
            true
        }
        Ok(_) => true,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            println!(
                "cargo:warning=Shader compiler '{}' was not found, shaders were not compiled",
                SHADER_COMPILER_NAME
            );
            false
        }
        Err(error) => {
            println!("cargo:warning=Failed to compile {}: {}", output_name, error);
            true
        }
    }
}
