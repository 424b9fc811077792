use std::{fs::File, sync::Arc};

use arrow::{
    array::{ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray},
    compute::cast,
    datatypes::{DataType, Field, Float64Type, Int64Type, Schema},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};

use super::{Column, Frame, TableError};

const CHUNK_SIZE: usize = 100_000;

pub(super) fn read_parquet(file: File) -> Result<Frame, TableError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|field| empty_column_for(field.data_type()))
        .collect();

    for batch in reader {
        let batch = batch?;
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            extend_from_array(column, array)?;
        }
    }

    let mut frame = Frame::new();
    for (field, column) in schema.fields().iter().zip(columns) {
        frame.push_column(field.name().as_str(), column);
    }

    Ok(frame)
}

fn empty_column_for(data_type: &DataType) -> Column {
    match data_type {
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => Column::Float(Vec::new()),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Column::Int(Vec::new()),
        DataType::Boolean => Column::Bool(Vec::new()),
        _ => Column::Text(Vec::new()),
    }
}

fn extend_from_array(column: &mut Column, array: &ArrayRef) -> Result<(), TableError> {
    match column {
        Column::Float(values) => {
            let casted = cast(array, &DataType::Float64)?;
            values.extend(
                casted
                    .as_primitive::<Float64Type>()
                    .iter()
                    .map(|v| v.filter(|v| !v.is_nan())),
            );
        }
        Column::Int(values) => {
            let casted = cast(array, &DataType::Int64)?;
            values.extend(casted.as_primitive::<Int64Type>().iter());
        }
        Column::Bool(values) => {
            values.extend(array.as_boolean().iter());
        }
        Column::Text(values) => {
            let casted = cast(array, &DataType::Utf8)?;
            values.extend(
                casted
                    .as_string::<i32>()
                    .iter()
                    .map(|v| v.map(str::to_string)),
            );
        }
    }
    Ok(())
}

fn to_field(name: &str, column: &Column) -> Field {
    let data_type = match column {
        Column::Text(_) => DataType::Utf8,
        Column::Float(_) => DataType::Float64,
        Column::Int(_) => DataType::Int64,
        Column::Bool(_) => DataType::Boolean,
    };
    Field::new(name, data_type, true)
}

fn to_array(column: &Column) -> ArrayRef {
    match column {
        Column::Text(v) => Arc::new(v.iter().map(|s| s.as_deref()).collect::<StringArray>()),
        Column::Float(v) => Arc::new(v.iter().copied().collect::<Float64Array>()),
        Column::Int(v) => Arc::new(v.iter().copied().collect::<Int64Array>()),
        Column::Bool(v) => Arc::new(v.iter().copied().collect::<BooleanArray>()),
    }
}

pub(super) fn write_parquet(frame: &Frame, file: File) -> Result<(), TableError> {
    let schema = Arc::new(Schema::new(
        frame
            .names()
            .iter()
            .zip(frame.columns())
            .map(|(name, column)| to_field(name, column))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = frame.columns().iter().map(to_array).collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

    let total_rows = batch.num_rows();
    let mut offset = 0;
    while offset < total_rows {
        let len = CHUNK_SIZE.min(total_rows - offset);
        writer.write(&batch.slice(offset, len))?;
        offset += len;
    }

    writer.close()?;

    Ok(())
}
