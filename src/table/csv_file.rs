use std::io::{Read, Write};

use csv::{ReaderBuilder, Writer};

use super::{Column, Frame, TableError};

/// Loads delimited text into a frame of text columns. Empty fields are null.
pub fn read_csv_from<R: Read>(reader: R, delimiter: u8) -> Result<Frame, TableError> {
    let mut rdr = ReaderBuilder::new().delimiter(delimiter).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record?;
        for (idx, column) in cells.iter_mut().enumerate() {
            let value = record
                .get(idx)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            column.push(value);
        }
    }

    let mut frame = Frame::new();
    for (name, values) in headers.iter().zip(cells) {
        frame.push_column(name, Column::Text(values));
    }

    Ok(frame)
}

pub fn write_csv<W: Write>(frame: &Frame, writer: W) -> Result<(), TableError> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(frame.names())?;

    for row in 0..frame.num_rows() {
        wtr.write_record(frame.columns().iter().map(|c| c.cell(row)))?;
    }
    wtr.flush()?;

    Ok(())
}
