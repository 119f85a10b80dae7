//! Filesystem helpers added to the standard `io` table

use std::fs;
use std::io;
use std::path::Path;

use mlua::{Lua, Table};

fn copy_folder(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_folder(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn write_file(path: &Path, data: &str, append: bool) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if append {
        use std::io::Write;
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(data.as_bytes())
    } else {
        fs::write(path, data)
    }
}

fn list_files(path: &Path) -> io::Result<Vec<String>> {
    let mut files = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path().to_string_lossy().into_owned()))
        .collect::<io::Result<Vec<_>>>()?;
    files.sort();
    Ok(files)
}

pub fn install(lua: &Lua) -> mlua::Result<()> {
    let io: Table = lua.globals().get("io")?;

    io.set(
        "fileexists",
        lua.create_function(|_, path: String| Ok(Path::new(&path).is_file()))?,
    )?;
    io.set(
        "writefile",
        lua.create_function(|_, (path, data, append): (String, mlua::String, Option<bool>)| {
            let data = data.to_str()?;
            Ok(write_file(Path::new(&path), &data, append.unwrap_or(false)).is_ok())
        })?,
    )?;
    io.set(
        "readfile",
        lua.create_function(|_, path: String| Ok(fs::read_to_string(path).unwrap_or_default()))?,
    )?;
    io.set(
        "movefile",
        lua.create_function(|_, (src, dest): (String, String)| Ok(fs::rename(src, dest).is_ok()))?,
    )?;
    io.set(
        "filesize",
        lua.create_function(|_, path: String| {
            Ok(fs::metadata(path).map(|m| m.len() as i64).unwrap_or(0))
        })?,
    )?;
    io.set(
        "removefile",
        lua.create_function(|_, path: String| Ok(fs::remove_file(path).is_ok()))?,
    )?;

    io.set(
        "createdirectory",
        lua.create_function(|_, path: String| Ok(fs::create_dir_all(path).is_ok()))?,
    )?;
    io.set(
        "directoryexists",
        lua.create_function(|_, path: String| Ok(Path::new(&path).is_dir()))?,
    )?;
    io.set(
        "directoryisempty",
        lua.create_function(|_, path: String| {
            Ok(fs::read_dir(path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(true))
        })?,
    )?;
    io.set(
        "listfiles",
        lua.create_function(|lua, path: String| {
            let files = list_files(Path::new(&path)).unwrap_or_default();
            lua.create_sequence_from(files)
        })?,
    )?;
    io.set(
        "copyfolder",
        lua.create_function(|_, (src, dest): (String, String)| {
            Ok(copy_folder(Path::new(&src), Path::new(&dest)).is_ok())
        })?,
    )?;
    io.set(
        "removedirectory",
        lua.create_function(|_, path: String| Ok(fs::remove_dir_all(path).is_ok()))?,
    )?;

    Ok(())
}
